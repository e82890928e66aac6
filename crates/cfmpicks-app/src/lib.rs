// League services: everything a request can do, independent of HTTP.
//
// `App` owns the primary store and the optional collaborators (sheet mirror,
// fallback writer, spreadsheet client, payments, blurb model). Each module
// adds its operations as an `impl App` block.

pub mod app;
pub mod blurbs;
pub mod error;
pub mod identity;
pub mod leagues;
pub mod payments;
pub mod picks;
pub mod profiles;
pub mod results;
pub mod sheet_sync;

pub use app::App;
pub use blurbs::BlurbService;
pub use error::{ServiceError, ServiceResult};
pub use identity::{DisabledVerifier, Identity, IdentityVerifier, SignedTokenVerifier};
pub use payments::Payments;
