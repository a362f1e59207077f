//! Site-wide Middleware
//!
//! - [`refresh_session`]: decodes the session cookie, refreshes it when due,
//!   exposes [`CurrentSession`] to handlers
//! - [`route_guard`]: path policy for `/admin`, `/bookings` and
//!   `/packages/<id>/book`
//!
//! Install `refresh_session` outside `route_guard` so the guard sees the
//! refreshed role.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use std::sync::Arc;

use platform::cookie::extract_cookie;

use crate::application::config::IdentityConfig;
use crate::application::route_guard::{GuardOutcome, evaluate as evaluate_route};
use crate::application::{CheckSessionUseCase, SessionState, TokenIntrospection, TokenIssuer};
use crate::domain::entity::session_claims::SessionClaims;
use crate::domain::repository::UserRepository;
use crate::presentation::handlers::session_cookie;

/// Verified session claims for the current request
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SessionClaims);

pub struct SessionMiddlewareState<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    pub repo: Arc<U>,
    pub config: Arc<IdentityConfig>,
}

impl<U> Clone for SessionMiddlewareState<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            config: self.config.clone(),
        }
    }
}

/// Refresh a due token on the way in, re-issue the cookie on the way out
pub async fn refresh_session<U>(
    State(state): State<SessionMiddlewareState<U>>,
    mut req: Request<Body>,
    next: Next,
) -> Response
where
    U: UserRepository + Send + Sync + 'static,
{
    let token = extract_cookie(req.headers(), &state.config.session_cookie_name);
    let use_case = CheckSessionUseCase::new(state.repo.clone(), state.config.clone());

    let session = match use_case.execute(token.as_deref()).await {
        Ok(session) => session,
        Err(e) => {
            // Store unavailable: keep serving on the unrefreshed token
            e.log();
            token
                .as_deref()
                .and_then(|t| TokenIssuer::new(state.config.clone()).decode(t))
                .map(SessionState::Current)
                .unwrap_or(SessionState::Anonymous)
        }
    };

    if let Some(claims) = session.claims() {
        req.extensions_mut().insert(CurrentSession(claims.clone()));
    }

    let mut response = next.run(req).await;

    if let SessionState::Refreshed {
        claims,
        session_token,
    } = session
    {
        // A handler that already wrote the session cookie (sign-in, sign-out) wins
        if !sets_cookie(&response, &state.config.session_cookie_name) {
            let cookie = session_cookie(&state.config, &claims, &session_token);
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }

    response
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Redirect requests the policy rejects; never touches the store
pub async fn route_guard(
    State(config): State<Arc<IdentityConfig>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let now = Utc::now();
    let session = match req.extensions().get::<CurrentSession>() {
        Some(CurrentSession(claims)) => TokenIntrospection::of(claims, now),
        None => {
            let token = extract_cookie(req.headers(), &config.session_cookie_name);
            TokenIssuer::new(config.clone()).introspect(token.as_deref(), now)
        }
    };

    match evaluate_route(req.uri().path(), &session) {
        GuardOutcome::PassThrough => next.run(req).await,
        GuardOutcome::Redirect { location, reason } => {
            tracing::debug!(
                path = %req.uri().path(),
                location = %location,
                reason = %reason,
                "Route guard redirect"
            );
            Redirect::temporary(&location).into_response()
        }
    }
}
