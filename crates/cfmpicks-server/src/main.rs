// League server entry point.
//
// Startup sequence:
// 1. Load config (copying defaults into place on first run)
// 2. Initialize tracing
// 3. Open the database
// 4. Wire optional collaborators from credentials: spreadsheet mirror and
//    fallback, payments, blurb model, token verifier
// 5. Serve HTTP until Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use cfmpicks_app::{
    App, BlurbService, DisabledVerifier, IdentityVerifier, Payments, SignedTokenVerifier,
};
use cfmpicks_core::config::{self, Config};
use cfmpicks_core::db::Database;
use cfmpicks_sheets::{SheetMirror, SheetsApi, SheetsClient, SheetsLeagueFallback};
use cfmpicks_server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;
    init_tracing(config.server.log_stdout)?;
    info!("CFM Picks server starting up");

    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    let (app, mirror_task) = build_app(&config, db)?;
    let verifier = build_verifier(&config)?;

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router(AppState::new(app, verifier)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("server error")?;

    // The router (and with it the mirror sender) is gone; give the worker a
    // moment to flush queued writes.
    if let Some(task) = mirror_task {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), task).await;
    }

    info!("CFM Picks server shut down cleanly");
    Ok(())
}

fn build_app(
    config: &Config,
    db: Database,
) -> anyhow::Result<(App, Option<tokio::task::JoinHandle<()>>)> {
    let mut app = App::new(Arc::new(db), config.league.clone())
        .with_payments(Payments::from_config(&config.payments, &config.credentials)?)
        .with_blurbs(BlurbService::from_config(config));

    let mut mirror_task = None;
    match &config.credentials.sheets_access_token {
        Some(token) if !token.is_empty() => {
            let api: Arc<dyn SheetsApi> =
                Arc::new(SheetsClient::new(&config.sheets.api_base, token.clone()));
            let bootstrap = config.sheets.bootstrap_spreadsheet_id.clone();
            let (mirror, task) =
                SheetMirror::spawn(api.clone(), bootstrap.clone(), config.sheets.mirror_queue_size);
            app = app.with_mirror(Arc::new(mirror)).with_sheets(api.clone());
            if let Some(id) = bootstrap {
                app = app.with_fallback(Arc::new(SheetsLeagueFallback::new(api, id)));
            }
            mirror_task = Some(task);
            info!("Spreadsheet mirror enabled");
        }
        _ => info!("Spreadsheet mirror disabled (no access token)"),
    }

    Ok((app, mirror_task))
}

fn build_verifier(config: &Config) -> anyhow::Result<Arc<dyn IdentityVerifier>> {
    match &config.credentials.auth_signing_key {
        Some(key) if !key.is_empty() => Ok(Arc::new(SignedTokenVerifier::new(key)?)),
        _ => {
            warn!("No auth signing key configured; every authenticated request will be rejected");
            Ok(Arc::new(DisabledVerifier))
        }
    }
}

/// Initialize tracing to `logs/cfmpicks.log`, or to stdout when configured.
fn init_tracing(to_stdout: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "cfmpicks=info,cfmpicks_server=info,cfmpicks_app=info,cfmpicks_core=info,cfmpicks_sheets=info,warn",
        )
    });

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    if to_stdout {
        tracing::subscriber::set_global_default(builder.finish())
            .context("failed to set tracing subscriber")?;
    } else {
        let log_dir = std::env::current_dir()?.join("logs");
        std::fs::create_dir_all(&log_dir)?;
        let log_file = std::fs::File::create(log_dir.join("cfmpicks.log"))?;
        let subscriber = builder.with_writer(log_file).with_ansi(false).finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set tracing subscriber")?;
    }

    Ok(())
}
