//! HTTP Handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use std::sync::Arc;

use platform::cookie::extract_cookie;
use platform::crypto::{constant_time_eq, random_bytes, to_base64url};

use crate::application::config::IdentityConfig;
use crate::application::{
    CheckSessionUseCase, OAuthSignInUseCase, PasswordResetUseCase, SessionState, SignInInput,
    SignInUseCase, SignUpInput, SignUpUseCase, TokenIssuer, VerifyEmailUseCase,
};
use crate::domain::entity::session_claims::SessionClaims;
use crate::domain::mailer::EmailSender;
use crate::domain::repository::{OAuthAccountRepository, UserRepository};
use crate::error::{AuthError, AuthResult};
use crate::infra::oauth::ProviderRegistry;
use crate::presentation::dto::{
    EmailRequest, MessageResponse, OAuthCallbackQuery, ResetPasswordRequest,
    SessionStatusResponse, SignInRequest, SignInResponse, SignUpRequest, SignUpResponse,
    VerifyEmailRequest,
};
use crate::presentation::middleware::CurrentSession;

/// Shared state for identity handlers
pub struct IdentityAppState<R, M>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub mailer: Arc<M>,
    pub config: Arc<IdentityConfig>,
    pub providers: Arc<ProviderRegistry>,
}

impl<R, M> Clone for IdentityAppState<R, M>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            mailer: self.mailer.clone(),
            config: self.config.clone(),
            providers: self.providers.clone(),
        }
    }
}

// ============================================================================
// Sign Up
// ============================================================================

/// POST /api/auth/signup
pub async fn sign_up<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    Json(req): Json<SignUpRequest>,
) -> AuthResult<(StatusCode, Json<SignUpResponse>)>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    let use_case = SignUpUseCase::new(state.repo.clone(), state.mailer.clone(), state.config.clone());

    let output = use_case
        .execute(SignUpInput {
            name: req.name,
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user_id: output.user_id,
            verification_required: true,
        }),
    ))
}

// ============================================================================
// Sign In / Sign Out
// ============================================================================

/// POST /api/auth/signin
pub async fn sign_in<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    Json(req): Json<SignInRequest>,
) -> AuthResult<Response>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    let use_case = SignInUseCase::new(state.repo.clone(), state.config.clone());

    let output = use_case
        .execute(SignInInput {
            email: req.email,
            password: req.password,
            remember_me: req.remember_me,
        })
        .await?;

    let cookie = session_cookie(&state.config, &output.claims, &output.session_token);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(SignInResponse {
            user: output.identity,
            expires_at: output.claims.exp,
        }),
    )
        .into_response())
}

/// POST /api/auth/signout
///
/// Tokens are not tracked server-side; dropping the cookie is the whole job.
pub async fn sign_out<R, M>(State(state): State<IdentityAppState<R, M>>) -> impl IntoResponse
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    (
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            state.config.session_cookie().delete_cookie_header(),
        )],
    )
}

// ============================================================================
// Session Status
// ============================================================================

/// GET /api/auth/session
///
/// Uses the session `refresh_session` already resolved when that layer is
/// installed; otherwise checks (and refreshes) the cookie here.
pub async fn session_status<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    current: Option<Extension<CurrentSession>>,
    headers: HeaderMap,
) -> AuthResult<Response>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    if let Some(Extension(CurrentSession(claims))) = current {
        return Ok(Json(SessionStatusResponse::from_claims(&claims)).into_response());
    }

    let token = extract_cookie(&headers, &state.config.session_cookie_name);
    let use_case = CheckSessionUseCase::new(state.repo.clone(), state.config.clone());

    match use_case.execute(token.as_deref()).await? {
        SessionState::Anonymous => Ok(Json(SessionStatusResponse::anonymous()).into_response()),
        SessionState::Current(claims) => {
            Ok(Json(SessionStatusResponse::from_claims(&claims)).into_response())
        }
        SessionState::Refreshed {
            claims,
            session_token,
        } => {
            let cookie = session_cookie(&state.config, &claims, &session_token);
            Ok((
                [(header::SET_COOKIE, cookie)],
                Json(SessionStatusResponse::from_claims(&claims)),
            )
                .into_response())
        }
    }
}

// ============================================================================
// Email Verification
// ============================================================================

/// POST /api/auth/verify-email
pub async fn verify_email<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    Json(req): Json<VerifyEmailRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    VerifyEmailUseCase::new(state.repo.clone(), state.mailer.clone())
        .verify(&req.email, &req.code)
        .await?;

    Ok(Json(MessageResponse {
        message: "Email verified. You can now sign in.",
    }))
}

/// POST /api/auth/verify-email/resend
pub async fn resend_verification<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    Json(req): Json<EmailRequest>,
) -> AuthResult<(StatusCode, Json<MessageResponse>)>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    VerifyEmailUseCase::new(state.repo.clone(), state.mailer.clone())
        .resend(&req.email)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "If the account needs verification, a new code is on its way.",
        }),
    ))
}

// ============================================================================
// Password Reset
// ============================================================================

/// POST /api/auth/password/forgot
pub async fn forgot_password<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    Json(req): Json<EmailRequest>,
) -> AuthResult<(StatusCode, Json<MessageResponse>)>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    PasswordResetUseCase::new(state.repo.clone(), state.mailer.clone(), state.config.clone())
        .request(&req.email)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "If an account exists for that email, a reset link is on its way.",
        }),
    ))
}

/// POST /api/auth/password/reset
pub async fn reset_password<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    PasswordResetUseCase::new(state.repo.clone(), state.mailer.clone(), state.config.clone())
        .reset(&req.token, req.password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password updated. You can now sign in.",
    }))
}

// ============================================================================
// OAuth
// ============================================================================

/// GET /api/auth/oauth/{provider}
pub async fn oauth_start<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    Path(provider): Path<String>,
) -> AuthResult<Response>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    let client = state.providers.get(&provider)?;

    let oauth_state = to_base64url(&random_bytes(32));
    let location = client.authorize_url(&oauth_state)?;
    let state_cookie = state
        .config
        .oauth_state_cookie()
        .set_cookie_header(&oauth_state, Some(state.config.oauth_state_ttl.as_secs()));

    Ok((
        [(header::SET_COOKIE, state_cookie)],
        Redirect::to(&location),
    )
        .into_response())
}

/// GET /api/auth/oauth/{provider}/callback
///
/// Always ends in a redirect: home on success, the sign-in page with an
/// error marker otherwise.
pub async fn oauth_callback<R, M>(
    State(state): State<IdentityAppState<R, M>>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
    headers: HeaderMap,
) -> Response
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    let clear_state = state.config.oauth_state_cookie().delete_cookie_header();

    match complete_oauth(&state, &provider, query, &headers).await {
        Ok((claims, token)) => {
            let cookie = session_cookie(&state.config, &claims, &token);
            (
                AppendHeaders([(header::SET_COOKIE, clear_state), (header::SET_COOKIE, cookie)]),
                Redirect::to("/"),
            )
                .into_response()
        }
        Err(e) => {
            e.log();
            let marker = match e {
                AuthError::OAuthAccountNotLinked => "OAuthAccountNotLinked",
                _ => "OAuthSignin",
            };
            (
                [(header::SET_COOKIE, clear_state)],
                Redirect::to(&format!("/login?error={marker}")),
            )
                .into_response()
        }
    }
}

async fn complete_oauth<R, M>(
    state: &IdentityAppState<R, M>,
    provider: &str,
    query: OAuthCallbackQuery,
    headers: &HeaderMap,
) -> AuthResult<(SessionClaims, String)>
where
    R: UserRepository + OAuthAccountRepository + Send + Sync + 'static,
    M: EmailSender + Send + Sync + 'static,
{
    let client = state.providers.get(provider)?;

    if let Some(error) = query.error {
        return Err(AuthError::OAuthProvider(format!("{provider} returned error: {error}")));
    }

    let expected = extract_cookie(headers, &state.config.oauth_state_cookie_name)
        .ok_or_else(|| AuthError::OAuthProvider("missing state cookie".to_string()))?;
    let returned = query.state.unwrap_or_default();
    if !constant_time_eq(expected.as_bytes(), returned.as_bytes()) {
        return Err(AuthError::OAuthProvider("state mismatch".to_string()));
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::OAuthProvider("missing authorization code".to_string()))?;

    let profile = client.exchange(&code).await?;

    let output = OAuthSignInUseCase::new(state.repo.clone(), state.mailer.clone(), state.config.clone())
        .execute(profile)
        .await?;

    Ok((output.claims, output.session_token))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Session cookie whose lifetime matches the token's lifetime class
pub(crate) fn session_cookie(
    config: &Arc<IdentityConfig>,
    claims: &SessionClaims,
    token: &str,
) -> HeaderValue {
    let max_age = TokenIssuer::new(config.clone()).cookie_max_age(claims);
    config.session_cookie().set_cookie_header(token, max_age)
}
