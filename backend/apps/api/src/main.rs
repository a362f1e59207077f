//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request errors are rendered by the
//! identity crate.

mod mailer;

use anyhow::Context;
use axum::{
    Router, http,
    http::{Method, header},
};
use base64::Engine;
use base64::engine::general_purpose;
use identity::config::IdentityConfig;
use identity::domain::mailer::EmailSender;
use identity::domain::repository::{OAuthAccountRepository, UserRepository};
use identity::mail::{HttpMailer, HttpMailerConfig, LogMailer, MailContent};
use identity::oauth::{OAuthClient, OAuthProviderConfig, ProviderRegistry};
use identity::presentation::IdentityAppState;
use identity::{InMemoryIdentityRepository, PgIdentityRepository, identity_router, with_session_layers};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::mailer::SiteMailer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,identity=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(load_identity_config()?);
    let mailer = Arc::new(load_mailer());
    let providers = Arc::new(load_providers());
    if providers.is_empty() {
        tracing::info!("No identity providers configured");
    }

    let cors = cors_layer();

    // Database connection; without one the site runs on the in-memory store
    let pool = match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;
            tracing::info!("Connected to database");

            sqlx::migrate!("../../../database/migrations")
                .run(&pool)
                .await?;
            tracing::info!("Migrations completed");

            Some(pool)
        }
        Err(_) => {
            if !cfg!(debug_assertions) {
                anyhow::bail!("DATABASE_URL must be set in production");
            }
            tracing::warn!("DATABASE_URL not set, using in-memory identity store");
            None
        }
    };

    let app = match &pool {
        Some(pool) => build_app(
            Arc::new(PgIdentityRepository::new(pool.clone())),
            mailer,
            config,
            providers,
        ),
        None => build_app(
            Arc::new(InMemoryIdentityRepository::new()),
            mailer,
            config,
            providers,
        ),
    }
    .layer(TraceLayer::new_for_http())
    .layer(cors);

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:31113".to_string())
        .parse()
        .context("BIND_ADDR must be a socket address")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        pool.close().await;
    }
    tracing::info!("Server stopped");

    Ok(())
}

/// Identity routes under `/api/auth`, with session refresh and the route
/// guard over the whole site
fn build_app<R, M>(
    repo: Arc<R>,
    mailer: Arc<M>,
    config: Arc<IdentityConfig>,
    providers: Arc<ProviderRegistry>,
) -> Router
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    let state = IdentityAppState {
        repo: repo.clone(),
        mailer,
        config: config.clone(),
        providers,
    };

    let site = Router::new().nest("/api/auth", identity_router(state));
    with_session_layers(site, repo, config)
}

fn load_identity_config() -> anyhow::Result<IdentityConfig> {
    let mut config = if cfg!(debug_assertions) {
        IdentityConfig::development()
    } else {
        IdentityConfig::default()
    };

    match env::var("SESSION_SECRET") {
        Ok(secret_b64) => {
            let secret_bytes = Engine::decode(&general_purpose::STANDARD, secret_b64.trim())
                .context("SESSION_SECRET must be base64")?;
            config.session_secret = secret_bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow::anyhow!("SESSION_SECRET must decode to 32 bytes"))?;
        }
        Err(_) if cfg!(debug_assertions) => {
            tracing::warn!("SESSION_SECRET not set, sessions will not survive a restart");
        }
        Err(_) => anyhow::bail!("SESSION_SECRET must be set in production"),
    }

    if let Ok(pepper) = env::var("PASSWORD_PEPPER") {
        config.password_pepper = Some(pepper.into_bytes());
    }

    config.allow_implicit_oauth_linking = env::var("ALLOW_IMPLICIT_OAUTH_LINKING")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    Ok(config)
}

fn load_mailer() -> SiteMailer {
    let content = MailContent {
        site_url: env::var("SITE_URL").unwrap_or_else(|_| MailContent::default().site_url),
        ..MailContent::default()
    };

    match (env::var("MAIL_API_URL"), env::var("MAIL_API_KEY")) {
        (Ok(api_url), Ok(api_key)) => {
            let config = HttpMailerConfig {
                api_url,
                api_key,
                sender_email: env::var("MAIL_SENDER")
                    .unwrap_or_else(|_| "no-reply@localhost".to_string()),
                sender_name: Some(content.site_name.clone()),
            };
            tracing::info!(api_url = %config.api_url, "Sending email through mail API");
            SiteMailer::Http(HttpMailer::new(config, content))
        }
        _ => {
            tracing::info!("Mail API not configured, logging outgoing email");
            SiteMailer::Log(LogMailer::new(content))
        }
    }
}

fn load_providers() -> ProviderRegistry {
    let redirect_base =
        env::var("OAUTH_REDIRECT_BASE").unwrap_or_else(|_| "http://localhost:31113".to_string());

    let mut registry = ProviderRegistry::new();
    if let (Ok(client_id), Ok(client_secret)) = (
        env::var("GOOGLE_CLIENT_ID"),
        env::var("GOOGLE_CLIENT_SECRET"),
    ) {
        registry = registry.with(OAuthClient::new(OAuthProviderConfig::google(
            client_id,
            client_secret,
            &redirect_base,
        )));
        tracing::info!("Google sign-in enabled");
    }
    registry
}

fn cors_layer() -> CorsLayer {
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
