//! Identity Router

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;

use crate::application::config::IdentityConfig;
use crate::domain::mailer::EmailSender;
use crate::domain::repository::{OAuthAccountRepository, UserRepository};
use crate::presentation::handlers::{self, IdentityAppState};
use crate::presentation::middleware::{SessionMiddlewareState, refresh_session, route_guard};

/// `/api/auth` routes for any store and mail transport
pub fn identity_router<R, M>(state: IdentityAppState<R, M>) -> Router
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    Router::new()
        .route("/signup", post(handlers::sign_up::<R, M>))
        .route("/signin", post(handlers::sign_in::<R, M>))
        .route("/signout", post(handlers::sign_out::<R, M>))
        .route("/session", get(handlers::session_status::<R, M>))
        .route("/verify-email", post(handlers::verify_email::<R, M>))
        .route(
            "/verify-email/resend",
            post(handlers::resend_verification::<R, M>),
        )
        .route("/password/forgot", post(handlers::forgot_password::<R, M>))
        .route("/password/reset", post(handlers::reset_password::<R, M>))
        .route("/oauth/{provider}", get(handlers::oauth_start::<R, M>))
        .route(
            "/oauth/{provider}/callback",
            get(handlers::oauth_callback::<R, M>),
        )
        .with_state(state)
}

/// Wrap a whole site in session refresh and the route guard
pub fn with_session_layers<U>(router: Router, repo: Arc<U>, config: Arc<IdentityConfig>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
{
    let session_state = SessionMiddlewareState {
        repo,
        config: config.clone(),
    };

    router
        .layer(middleware::from_fn_with_state(config, route_guard))
        .layer(middleware::from_fn_with_state(
            session_state,
            refresh_session::<U>,
        ))
}
