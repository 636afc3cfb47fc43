//! Authors Haven - A community publishing platform backend

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authors_haven::{
    api::{self, AppState},
    config::Config,
    db::{self, repositories::SqlxNotificationRepository},
    services::{create_mailer, DigestJob, HttpIdentityClient},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authors_haven=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Authors Haven...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let mailer = create_mailer(&config.mail)?;
    let identity_client = Arc::new(HttpIdentityClient::new(config.social.clone()));

    // Build application state
    let state = AppState::new(pool.clone(), &config, mailer.clone(), identity_client);

    // Start rate limiter cleanup task (runs every 5 minutes)
    {
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                let removed = limiter.cleanup().await;
                if removed > 0 {
                    tracing::debug!(removed, "Login rate limiter cleaned up");
                }
            }
        });
    }

    // Start notification email digest
    if config.notifications.digest_enabled {
        let job = Arc::new(DigestJob::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            mailer,
            config.mail.site_url.clone(),
        ));
        let every = Duration::from_secs(config.notifications.digest_interval_minutes * 60);
        tokio::spawn(job.run_every(every));
        tracing::info!(
            "Notification digest scheduled every {} minute(s)",
            config.notifications.digest_interval_minutes
        );
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
