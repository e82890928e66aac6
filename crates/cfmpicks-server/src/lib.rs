// HTTP surface for the league services.

pub mod auth;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use cfmpicks_app::{App, IdentityVerifier};

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<App>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(app: App, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            app: Arc::new(app),
            verifier,
        }
    }
}

pub fn router(state: AppState) -> Router {
    use routes::*;

    let leagues = Router::new()
        .route("/", get(list_leagues).post(create_league))
        .route("/join", post(join_league))
        .route("/:id", get(get_league))
        .route("/:id/settings", put(update_settings))
        .route("/:id/members", get(members))
        .route("/:id/membership", delete(leave_league))
        .route("/:id/matchups", get(list_matchups).post(add_matchups))
        .route("/:id/matchups/import", post(import_matchups))
        .route("/:id/matchups/:mid/blurb", get(matchup_blurb))
        .route("/:id/bets", get(my_bets).post(submit_picks))
        .route("/:id/results", get(results_log).post(mark_winner))
        .route("/:id/leaderboard", get(leaderboard))
        .route("/:id/sheet", post(connect_sheet))
        .route("/:id/sheet/import", post(import_sheet));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/profile", get(get_profile).put(update_profile))
        .route("/api/profile/migrate", post(migrate_profile))
        .nest("/api/leagues", leagues)
        .route("/api/payments/intent", post(create_intent))
        .route("/api/payments/webhook", post(payments_webhook))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
