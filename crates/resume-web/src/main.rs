mod api;
mod app;
mod config;
mod error;
mod middleware;
mod state;

use std::time::Duration;

use resume_guard::CounterStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "resume_web=debug,resume_guard=info,access=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr;
    let tls_config = config.tls.clone();

    let limits = &config.rate_limit;
    if limits.enabled {
        tracing::info!(
            "Rate limit: {} requests per {}s, {} login attempts per {}s ({:?} window, {} whitelisted)",
            limits.general_limit,
            limits.general_window_seconds,
            limits.login_limit,
            limits.login_window_seconds,
            limits.window_mode,
            limits.whitelist.len(),
        );
    } else {
        tracing::warn!("Rate limiting disabled");
    }

    let state = AppState::new(config);

    // Expired counter sweep
    let store = state.store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!("Purged {purged} expired counters, {} live", store.len());
            }
        }
    });

    let app = app::build_app(state);

    if let (Some(cert), Some(key)) = (&tls_config.cert_path, &tls_config.key_path) {
        use axum_server::tls_rustls::RustlsConfig;
        let rustls_config = RustlsConfig::from_pem_file(cert, key).await?;
        tracing::info!("resume-web listening on https://{}", bind_addr);
        axum_server::bind_rustls(bind_addr, rustls_config)
            .serve(app.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(bind_addr).await?;
        tracing::info!("resume-web listening on http://{}", bind_addr);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}
