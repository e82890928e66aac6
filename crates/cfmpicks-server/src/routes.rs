// Request handlers. Each one unpacks the request, calls a single service
// operation and serializes the result.

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use cfmpicks_app::blurbs::MatchupBlurb;
use cfmpicks_app::leagues::{CreatedLeague, JoinedLeague, LeagueSummary, MemberView, SettingsPatch};
use cfmpicks_app::payments::{UpgradeIntent, WebhookAck};
use cfmpicks_app::picks::{CsvImport, MatchupInput, PickInput, WeekMatchups};
use cfmpicks_app::profiles::{MigrationReport, ProfileUpdate};
use cfmpicks_app::results::WinnerMarked;
use cfmpicks_app::sheet_sync::{SheetConnection, SheetImport};
use cfmpicks_app::ServiceError;
use cfmpicks_core::model::{Bet, LeaderboardEntry, League, Matchup, ResultLogEntry, UserProfile};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Header carrying the payments provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

type JsonBody<T> = Result<Json<T>, JsonRejection>;

// -- request bodies ------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateLeagueBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinBody {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub week: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AddMatchupsBody {
    pub week: u32,
    pub matchups: Vec<MatchupInput>,
}

#[derive(Debug, Deserialize)]
pub struct PicksBody {
    pub picks: Vec<PickInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerBody {
    pub matchup_id: i64,
    pub winner: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetBody {
    pub spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentBody {
    pub league_id: String,
}

// -- health and profile --------------------------------------------------

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.app.ensure_profile(&who)?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    body: JsonBody<ProfileUpdate>,
) -> ApiResult<Json<UserProfile>> {
    let Json(update) = body?;
    Ok(Json(state.app.update_profile(&who, update)?))
}

pub async fn migrate_profile(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
) -> ApiResult<Json<MigrationReport>> {
    Ok(Json(state.app.migrate_legacy_roles(&who)?))
}

// -- leagues -------------------------------------------------------------

pub async fn list_leagues(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
) -> ApiResult<Json<Vec<LeagueSummary>>> {
    Ok(Json(state.app.my_leagues(&who)?))
}

pub async fn create_league(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    body: JsonBody<CreateLeagueBody>,
) -> ApiResult<(StatusCode, Json<CreatedLeague>)> {
    let Json(body) = body?;
    let created = state.app.create_league(&who, &body.name).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn join_league(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    body: JsonBody<JoinBody>,
) -> ApiResult<Json<JoinedLeague>> {
    let Json(body) = body?;
    Ok(Json(state.app.join_league(&who, &body.code)?))
}

pub async fn get_league(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<LeagueSummary>> {
    Ok(Json(state.app.get_league(&who, &id)?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
    body: JsonBody<SettingsPatch>,
) -> ApiResult<Json<League>> {
    let Json(patch) = body?;
    Ok(Json(state.app.update_settings(&who, &id, patch)?))
}

pub async fn members(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<MemberView>>> {
    Ok(Json(state.app.members(&who, &id)?))
}

pub async fn leave_league(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.app.leave_league(&who, &id)?;
    Ok(Json(json!({ "left": true })))
}

// -- matchups and picks --------------------------------------------------

pub async fn list_matchups(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
    query: Result<Query<WeekQuery>, QueryRejection>,
) -> ApiResult<Json<WeekMatchups>> {
    let Query(q) = query?;
    Ok(Json(state.app.list_matchups(&who, &id, q.week)?))
}

pub async fn add_matchups(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
    body: JsonBody<AddMatchupsBody>,
) -> ApiResult<(StatusCode, Json<Vec<Matchup>>)> {
    let Json(body) = body?;
    let added = state.app.add_matchups(&who, &id, body.week, body.matchups)?;
    Ok((StatusCode::CREATED, Json(added)))
}

pub async fn import_matchups(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
    csv: String,
) -> ApiResult<(StatusCode, Json<CsvImport>)> {
    let imported = state.app.import_matchups_csv(&who, &id, &csv)?;
    Ok((StatusCode::CREATED, Json(imported)))
}

pub async fn matchup_blurb(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path((id, matchup_id)): Path<(String, i64)>,
) -> ApiResult<Json<MatchupBlurb>> {
    Ok(Json(state.app.matchup_blurb(&who, &id, matchup_id).await?))
}

pub async fn my_bets(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Bet>>> {
    Ok(Json(state.app.my_bets(&who, &id)?))
}

pub async fn submit_picks(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
    body: JsonBody<PicksBody>,
) -> ApiResult<(StatusCode, Json<Vec<Bet>>)> {
    let Json(body) = body?;
    let bets = state.app.submit_picks(&who, &id, body.picks)?;
    Ok((StatusCode::CREATED, Json(bets)))
}

// -- results -------------------------------------------------------------

pub async fn results_log(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ResultLogEntry>>> {
    Ok(Json(state.app.results_log(&who, &id)?))
}

pub async fn mark_winner(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
    body: JsonBody<WinnerBody>,
) -> ApiResult<Json<WinnerMarked>> {
    let Json(body) = body?;
    Ok(Json(state.app.mark_winner(
        &who,
        &id,
        body.matchup_id,
        &body.winner,
    )?))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    Ok(Json(state.app.leaderboard(&who, &id)?))
}

// -- league sheet --------------------------------------------------------

pub async fn connect_sheet(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
    body: JsonBody<SheetBody>,
) -> ApiResult<Json<SheetConnection>> {
    let Json(body) = body?;
    Ok(Json(
        state.app.connect_sheet(&who, &id, &body.spreadsheet_id).await?,
    ))
}

pub async fn import_sheet(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<SheetImport>> {
    Ok(Json(state.app.import_from_sheet(&who, &id).await?))
}

// -- payments ------------------------------------------------------------

pub async fn create_intent(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    body: JsonBody<IntentBody>,
) -> ApiResult<Json<UpgradeIntent>> {
    let Json(body) = body?;
    Ok(Json(
        state.app.create_upgrade_intent(&who, &body.league_id).await?,
    ))
}

pub async fn payments_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError(ServiceError::validation("missing signature header")))?;
    Ok(Json(state.app.handle_webhook(signature, &body)?))
}

pub async fn not_found() -> ApiError {
    ApiError(ServiceError::not_found("no such endpoint"))
}
