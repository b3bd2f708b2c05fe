use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bullet_sync::auth::{AuthContext, AuthStatus, UserIdentity};
use bullet_sync::config::Config;
use bullet_sync::evaluation::taxonomy::report_title;
use bullet_sync::evaluation::weights::weight_errors;
use bullet_sync::store::http::{build_http_client, HttpRemoteStore, SessionCookie};
use bullet_sync::sync::UserDataSync;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting bullet-sync v{}", env!("CARGO_PKG_VERSION"));

    let touch = std::env::args().skip(1).any(|arg| arg == "--touch");

    let client = build_http_client().context("Failed to build HTTP client")?;
    let store = HttpRemoteStore::new(
        client,
        &config.base_url,
        Some(SessionCookie {
            name: config.session_cookie_name.clone(),
            value: config.session_token.clone(),
        }),
    );

    let auth = AuthContext::new(AuthStatus::Authenticated(UserIdentity {
        id: config.user_id.clone(),
        email: config.user_email.clone(),
    }));
    let sync = UserDataSync::spawn(Arc::new(store), auth.subscribe(), config.sync.clone());

    sync.load().await;
    if let Some(err) = sync.load_error() {
        warn!("{err}");
    }

    sync.with_document(|doc| {
        let prefs = &doc.preferences;
        info!(
            "{} for rank {} ({:?})",
            report_title(prefs.rank_category, &prefs.rank),
            prefs.rank,
            prefs.rank_category
        );
        info!(
            "{} bullet(s), {} applied, {} summarized categor(ies)",
            doc.bullets.len(),
            doc.applied_bullets().count(),
            doc.summaries.len()
        );
        for (category, message) in weight_errors(doc) {
            warn!("{category}: {message}");
        }
    });
    match sync.remote_id() {
        Some(id) => info!("Remote record: {id}"),
        None => info!("No remote record yet"),
    }

    if touch {
        match sync.save_now().await {
            Ok(()) => info!(
                "Saved user data (record {})",
                sync.remote_id().unwrap_or_default()
            ),
            Err(e) => {
                warn!("Save failed: {e}");
                return Err(e.into());
            }
        }
    }

    info!("Save status: {:?}", sync.save_status());
    Ok(())
}
