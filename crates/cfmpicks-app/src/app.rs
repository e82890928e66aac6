// The service container: primary store, mirror, and the optional outside
// collaborators. Operations live in the sibling modules as `impl App` blocks.

use std::sync::Arc;

use tracing::debug;

use cfmpicks_core::config::LeagueRules;
use cfmpicks_core::mirror::{LeagueFallback, MirrorEvent, MirrorSink, NoopMirror};
use cfmpicks_core::model::{League, Membership};
use cfmpicks_core::store::LeagueStore;
use cfmpicks_sheets::SheetsApi;

use crate::blurbs::BlurbService;
use crate::error::{ServiceError, ServiceResult};
use crate::identity::Identity;
use crate::payments::Payments;

pub struct App {
    pub(crate) store: Arc<dyn LeagueStore>,
    pub(crate) mirror: Arc<dyn MirrorSink>,
    pub(crate) fallback: Option<Arc<dyn LeagueFallback>>,
    pub(crate) sheets: Option<Arc<dyn SheetsApi>>,
    pub(crate) payments: Payments,
    pub(crate) blurbs: BlurbService,
    pub(crate) rules: LeagueRules,
}

impl App {
    /// An app with only the primary store: no mirror, no fallback, payments
    /// and sheets unavailable, template blurbs.
    pub fn new(store: Arc<dyn LeagueStore>, rules: LeagueRules) -> Self {
        Self {
            store,
            mirror: Arc::new(NoopMirror),
            fallback: None,
            sheets: None,
            payments: Payments::disabled(),
            blurbs: BlurbService::disabled(),
            rules,
        }
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn MirrorSink>) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn LeagueFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_sheets(mut self, sheets: Arc<dyn SheetsApi>) -> Self {
        self.sheets = Some(sheets);
        self
    }

    pub fn with_payments(mut self, payments: Payments) -> Self {
        self.payments = payments;
        self
    }

    pub fn with_blurbs(mut self, blurbs: BlurbService) -> Self {
        self.blurbs = blurbs;
        self
    }

    pub fn store(&self) -> &dyn LeagueStore {
        self.store.as_ref()
    }

    // -- access checks ---------------------------------------------------

    pub(crate) fn league_or_404(&self, league_id: &str) -> ServiceResult<League> {
        self.store
            .league(league_id)?
            .ok_or_else(|| ServiceError::not_found(format!("league {league_id} not found")))
    }

    /// The league plus the caller's active membership in it.
    pub(crate) fn require_member(
        &self,
        identity: &Identity,
        league_id: &str,
    ) -> ServiceResult<(League, Membership)> {
        let league = self.league_or_404(league_id)?;
        match self.store.membership(&identity.uid, league_id)? {
            Some(m) if m.active => Ok((league, m)),
            _ => Err(ServiceError::forbidden("not a member of this league")),
        }
    }

    pub(crate) fn require_admin(
        &self,
        identity: &Identity,
        league_id: &str,
    ) -> ServiceResult<(League, Membership)> {
        let (league, membership) = self.require_member(identity, league_id)?;
        if !membership.is_admin() {
            return Err(ServiceError::forbidden("league admin only"));
        }
        Ok((league, membership))
    }

    // -- mirroring -------------------------------------------------------

    pub(crate) fn mirror(&self, event: MirrorEvent) {
        self.mirror.notify(event);
    }

    /// Mirror a per-league event when the league has a connected sheet.
    pub(crate) fn mirror_to_sheet(&self, league: &League, event: impl FnOnce(String) -> MirrorEvent) {
        match &league.settings.spreadsheet_id {
            Some(id) => self.mirror.notify(event(id.clone())),
            None => debug!(league_id = %league.id, "no league sheet connected, not mirroring"),
        }
    }
}
