//! Use-case and router scenarios against the in-memory store

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::routing::get;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use tower::ServiceExt;

use crate::application::{
    CheckSessionUseCase, OAuthSignInUseCase, PasswordResetUseCase, SessionState, SignInInput,
    SignInUseCase, SignUpInput, SignUpUseCase, TokenIssuer, VerifyEmailUseCase,
};
use crate::domain::entity::{linked_account::ProviderProfile, user::User};
use crate::domain::mailer::{EmailSender, MailError};
use crate::domain::value_object::{
    email::Email,
    reset_token::ResetToken,
    user_password::{RawPassword, UserPassword},
    user_role::UserRole,
    verification_code::VerificationCode,
};
use crate::error::AuthError;
use crate::infra::{InMemoryIdentityRepository, ProviderRegistry};
use crate::presentation::{IdentityAppState, identity_router, with_session_layers};
use crate::IdentityConfig;

const PASSWORD: &str = "Lisbon-Sunsets-42";

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum SentMail {
    Verification { to: String, code: String },
    Welcome { to: String },
    PasswordReset { to: String, token: String },
}

#[derive(Clone, Default)]
struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentMail>>>,
    fail: bool,
}

impl RecordingMailer {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().clone()
    }

    fn record(&self, mail: SentMail) -> Result<(), MailError> {
        self.sent.lock().push(mail);
        if self.fail {
            return Err(MailError::Rejected(503));
        }
        Ok(())
    }

    fn welcome_count(&self, to: &str) -> usize {
        self.sent()
            .iter()
            .filter(|m| matches!(m, SentMail::Welcome { to: t } if t == to))
            .count()
    }

    fn last_code(&self, to: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m {
            SentMail::Verification { to: t, code } if t == to => Some(code),
            _ => None,
        })
    }

    fn reset_tokens(&self, to: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                SentMail::PasswordReset { to: t, token } if t == to => Some(token),
                _ => None,
            })
            .collect()
    }
}

impl EmailSender for RecordingMailer {
    async fn send_verification_email(
        &self,
        to: &Email,
        _name: Option<&str>,
        code: &VerificationCode,
    ) -> Result<(), MailError> {
        self.record(SentMail::Verification {
            to: to.to_string(),
            code: code.as_str().to_string(),
        })
    }

    async fn send_welcome_email(&self, to: &Email, _name: Option<&str>) -> Result<(), MailError> {
        self.record(SentMail::Welcome { to: to.to_string() })
    }

    async fn send_password_reset_email(
        &self,
        to: &Email,
        _name: Option<&str>,
        token: &ResetToken,
    ) -> Result<(), MailError> {
        self.record(SentMail::PasswordReset {
            to: to.to_string(),
            token: token.as_str().to_string(),
        })
    }
}

struct Harness {
    repo: Arc<InMemoryIdentityRepository>,
    mailer: Arc<RecordingMailer>,
    config: Arc<IdentityConfig>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(IdentityConfig::default())
    }

    fn with_config(config: IdentityConfig) -> Self {
        Self {
            repo: Arc::new(InMemoryIdentityRepository::new()),
            mailer: Arc::new(RecordingMailer::default()),
            config: Arc::new(config),
        }
    }

    fn sign_in(&self) -> SignInUseCase<InMemoryIdentityRepository> {
        SignInUseCase::new(self.repo.clone(), self.config.clone())
    }

    fn sign_up(&self) -> SignUpUseCase<InMemoryIdentityRepository, RecordingMailer> {
        SignUpUseCase::new(self.repo.clone(), self.mailer.clone(), self.config.clone())
    }

    fn verify(&self) -> VerifyEmailUseCase<InMemoryIdentityRepository, RecordingMailer> {
        VerifyEmailUseCase::new(self.repo.clone(), self.mailer.clone())
    }

    fn reset(&self) -> PasswordResetUseCase<InMemoryIdentityRepository, RecordingMailer> {
        PasswordResetUseCase::new(self.repo.clone(), self.mailer.clone(), self.config.clone())
    }

    fn oauth(&self) -> OAuthSignInUseCase<InMemoryIdentityRepository, RecordingMailer> {
        OAuthSignInUseCase::new(self.repo.clone(), self.mailer.clone(), self.config.clone())
    }

    fn check(&self) -> CheckSessionUseCase<InMemoryIdentityRepository> {
        CheckSessionUseCase::new(self.repo.clone(), self.config.clone())
    }

    fn issuer(&self) -> TokenIssuer {
        TokenIssuer::new(self.config.clone())
    }

    /// Password account, verified unless told otherwise
    fn seed_password_user(&self, email: &str, verified: bool) -> User {
        let raw = RawPassword::new(PASSWORD.to_string()).unwrap();
        let hash = UserPassword::from_raw(&raw, self.config.pepper()).unwrap();
        let code = VerificationCode::generate();
        let mut user =
            User::new_with_password(Email::new(email).unwrap(), Some("Ana".into()), hash, &code, Utc::now());
        if verified {
            user.email_verified = Some(Utc::now());
            user.verification_token = None;
        }
        self.repo.put_user(user.clone());
        user
    }

    fn app(&self) -> Router {
        let state = IdentityAppState {
            repo: self.repo.clone(),
            mailer: self.mailer.clone(),
            config: self.config.clone(),
            providers: Arc::new(ProviderRegistry::new()),
        };
        let site = Router::new()
            .route("/admin", get(|| async { "admin" }))
            .route("/bookings/{id}", get(|| async { "booking" }))
            .route("/packages/{id}/book", get(|| async { "book" }))
            .route("/", get(|| async { "home" }))
            .nest("/api/auth", identity_router(state));
        with_session_layers(site, self.repo.clone(), self.config.clone())
    }
}

fn credentials(email: &str, password: &str, remember_me: bool) -> SignInInput {
    SignInInput {
        email: Some(email.to_string()),
        password: Some(password.to_string()),
        remember_me,
    }
}

fn google_profile(sub: &str, email: &str) -> ProviderProfile {
    ProviderProfile {
        provider: "google".to_string(),
        provider_account_id: sub.to_string(),
        email: email.to_string(),
        name: Some("Ana Google".to_string()),
        image: Some("https://example.com/ana.png".to_string()),
    }
}

// ============================================================================
// Credential sign-in
// ============================================================================

#[tokio::test]
async fn test_unknown_email_and_wrong_password_fail_alike() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);

    let unknown = h
        .sign_in()
        .execute(credentials("nobody@example.com", PASSWORD, false))
        .await
        .unwrap_err();
    let wrong = h
        .sign_in()
        .execute(credentials("ana@example.com", "Not-The-Password-1", false))
        .await
        .unwrap_err();

    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert_eq!(unknown.to_app_error().to_string(), wrong.to_app_error().to_string());
}

#[tokio::test]
async fn test_missing_fields_are_invalid_credentials() {
    let h = Harness::new();

    for input in [
        SignInInput { email: None, password: Some(PASSWORD.into()), remember_me: false },
        SignInInput { email: Some("ana@example.com".into()), password: None, remember_me: false },
        SignInInput { email: Some("".into()), password: Some("".into()), remember_me: false },
    ] {
        assert!(matches!(
            h.sign_in().execute(input).await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}

#[tokio::test]
async fn test_provider_only_account_cannot_use_password() {
    let h = Harness::new();
    h.oauth()
        .execute(google_profile("g-1", "ana@example.com"))
        .await
        .unwrap();

    assert!(matches!(
        h.sign_in().execute(credentials("ana@example.com", PASSWORD, false)).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_unverified_account_with_correct_password_is_gated() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", false);

    assert!(matches!(
        h.sign_in().execute(credentials("ana@example.com", PASSWORD, false)).await,
        Err(AuthError::EmailNotVerified)
    ));
    // Wrong password never reveals verification state
    assert!(matches!(
        h.sign_in().execute(credentials("ana@example.com", "Other-Password-9", false)).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_sign_in_email_is_case_insensitive() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", true);

    let output = h
        .sign_in()
        .execute(credentials("  ANA@Example.com ", PASSWORD, false))
        .await
        .unwrap();
    assert_eq!(output.identity.user_id, user.user_id);
}

#[tokio::test]
async fn test_sign_in_output_debug_hides_token() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);

    let output = h
        .sign_in()
        .execute(credentials("ana@example.com", PASSWORD, false))
        .await
        .unwrap();
    let rendered = format!("{output:?}");
    assert!(rendered.contains("[REDACTED]"));
    assert!(!rendered.contains(&output.session_token));

    let oauth = h
        .oauth()
        .execute(google_profile("g-1", "bo@example.com"))
        .await
        .unwrap();
    assert!(!format!("{oauth:?}").contains(&oauth.session_token));
}

#[tokio::test]
async fn test_expiry_law() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);
    let now = Utc::now();

    let short = h
        .sign_in()
        .execute_at(credentials("ana@example.com", PASSWORD, false), now)
        .await
        .unwrap();
    let long = h
        .sign_in()
        .execute_at(credentials("ana@example.com", PASSWORD, true), now)
        .await
        .unwrap();

    assert_eq!(short.claims.exp, now.timestamp() + 86_400);
    assert_eq!(long.claims.exp, now.timestamp() + 2_592_000);
    assert_eq!(h.issuer().decode(&long.session_token), Some(long.claims));
}

// ============================================================================
// Sign-up and email verification
// ============================================================================

#[tokio::test]
async fn test_sign_up_then_verify_then_sign_in() {
    let h = Harness::new();

    let output = h
        .sign_up()
        .execute(SignUpInput {
            name: Some("Ana".into()),
            email: "Ana@Example.com".into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap();
    assert_eq!(output.email.as_str(), "ana@example.com");

    let code = h.mailer.last_code("ana@example.com").unwrap();
    assert!(matches!(
        h.sign_in().execute(credentials("ana@example.com", PASSWORD, false)).await,
        Err(AuthError::EmailNotVerified)
    ));

    h.verify().verify("ana@example.com", &code).await.unwrap();

    let signed_in = h
        .sign_in()
        .execute(credentials("ana@example.com", PASSWORD, false))
        .await
        .unwrap();
    assert!(signed_in.identity.email_verified.is_some());
    assert_eq!(h.mailer.welcome_count("ana@example.com"), 1);
}

#[tokio::test]
async fn test_sign_up_rejects_duplicate_and_weak_input() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);

    let duplicate = h
        .sign_up()
        .execute(SignUpInput { name: None, email: "ANA@example.com".into(), password: PASSWORD.into() })
        .await;
    assert!(matches!(duplicate, Err(AuthError::EmailTaken)));

    let weak = h
        .sign_up()
        .execute(SignUpInput { name: None, email: "bo@example.com".into(), password: "password123".into() })
        .await;
    assert!(matches!(weak, Err(AuthError::PasswordValidation(_))));

    let bad_email = h
        .sign_up()
        .execute(SignUpInput { name: None, email: "not-an-email".into(), password: PASSWORD.into() })
        .await;
    assert!(matches!(bad_email, Err(AuthError::Validation(_))));
    assert_eq!(h.repo.user_count(), 1);
}

#[tokio::test]
async fn test_sign_up_survives_mail_failure() {
    let mut h = Harness::new();
    h.mailer = Arc::new(RecordingMailer::failing());

    h.sign_up()
        .execute(SignUpInput { name: None, email: "ana@example.com".into(), password: PASSWORD.into() })
        .await
        .unwrap();

    let user = h.repo.user_by_email("ana@example.com").unwrap();
    assert!(user.verification_token.is_some());
}

#[tokio::test]
async fn test_verification_code_is_single_use() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", false);
    let code = user.verification_token.clone().unwrap();

    h.verify().verify("ana@example.com", &code).await.unwrap();
    assert!(matches!(
        h.verify().verify("ana@example.com", &code).await,
        Err(AuthError::InvalidVerificationCode)
    ));

    let stored = h.repo.user_by_email("ana@example.com").unwrap();
    assert!(stored.email_verified.is_some());
    assert!(stored.verification_token.is_none());
    assert_eq!(h.mailer.welcome_count("ana@example.com"), 1);
}

#[tokio::test]
async fn test_wrong_code_leaves_account_unverified() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", false);
    let code = user.verification_token.unwrap();
    let wrong = if code == "111111" { "222222" } else { "111111" };

    for attempt in [wrong, "abc", ""] {
        assert!(matches!(
            h.verify().verify("ana@example.com", attempt).await,
            Err(AuthError::InvalidVerificationCode)
        ));
    }
    assert!(h.repo.user_by_email("ana@example.com").unwrap().email_verified.is_none());
}

#[tokio::test]
async fn test_resend_replaces_code() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", false);
    let old_code = user.verification_token.unwrap();

    h.verify().resend("ana@example.com").await.unwrap();
    let new_code = h.mailer.last_code("ana@example.com").unwrap();

    if old_code != new_code {
        assert!(h.verify().verify("ana@example.com", &old_code).await.is_err());
    }
    h.verify().verify("ana@example.com", &new_code).await.unwrap();
}

#[tokio::test]
async fn test_resend_is_silent_for_unknown_and_verified() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);

    h.verify().resend("ana@example.com").await.unwrap();
    h.verify().resend("nobody@example.com").await.unwrap();
    h.verify().resend("garbage").await.unwrap();

    assert!(h.mailer.sent().is_empty());
}

// ============================================================================
// OAuth linking
// ============================================================================

#[tokio::test]
async fn test_oauth_new_user_is_verified_and_welcomed_once() {
    let h = Harness::new();

    let first = h
        .oauth()
        .execute(google_profile("g-1", "Ana@Example.com"))
        .await
        .unwrap();
    assert!(first.is_new_user);

    let user = h.repo.user_by_email("ana@example.com").unwrap();
    assert!(user.email_verified.is_some());
    assert!(user.verification_token.is_none());
    assert!(!user.has_password());
    assert_eq!(user.image.as_deref(), Some("https://example.com/ana.png"));
    assert_eq!(h.repo.linked_accounts(&user.user_id).len(), 1);

    let second = h
        .oauth()
        .execute(google_profile("g-1", "ana@example.com"))
        .await
        .unwrap();
    assert!(!second.is_new_user);
    assert_eq!(second.identity.user_id, first.identity.user_id);
    assert_eq!(h.mailer.welcome_count("ana@example.com"), 1);
    assert_eq!(h.repo.user_count(), 1);
}

#[tokio::test]
async fn test_oauth_session_uses_short_lifetime() {
    let h = Harness::new();
    let now = Utc::now();

    let output = h
        .oauth()
        .execute_at(google_profile("g-1", "ana@example.com"), now)
        .await
        .unwrap();
    assert_eq!(output.claims.exp, now.timestamp() + 86_400);
    assert!(!output.claims.remember_me);
}

#[tokio::test]
async fn test_oauth_links_second_provider_to_passwordless_account() {
    let h = Harness::new();
    h.oauth()
        .execute(google_profile("g-1", "ana@example.com"))
        .await
        .unwrap();

    let mut other = google_profile("gh-9", "ana@example.com");
    other.provider = "github".to_string();
    let output = h.oauth().execute(other).await.unwrap();

    assert!(!output.is_new_user);
    assert_eq!(h.repo.linked_accounts(&output.identity.user_id).len(), 2);
}

#[tokio::test]
async fn test_oauth_refuses_password_account_by_default() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", false);

    assert!(matches!(
        h.oauth().execute(google_profile("g-1", "ana@example.com")).await,
        Err(AuthError::OAuthAccountNotLinked)
    ));
    assert!(h.repo.linked_accounts(&user.user_id).is_empty());
    assert!(h.repo.user_by_email("ana@example.com").unwrap().email_verified.is_none());
}

#[tokio::test]
async fn test_oauth_implicit_linking_verifies_password_account() {
    let h = Harness::with_config(IdentityConfig {
        allow_implicit_oauth_linking: true,
        ..IdentityConfig::default()
    });
    let user = h.seed_password_user("ana@example.com", false);

    let output = h
        .oauth()
        .execute(google_profile("g-1", "ana@example.com"))
        .await
        .unwrap();

    assert_eq!(output.identity.user_id, user.user_id);
    assert!(output.identity.email_verified.is_some());
    let stored = h.repo.user_by_email("ana@example.com").unwrap();
    assert!(stored.email_verified.is_some());
    assert!(stored.verification_token.is_none());
    assert_eq!(h.repo.linked_accounts(&user.user_id).len(), 1);
}

#[tokio::test]
async fn test_oauth_clears_stale_code_on_verified_account() {
    let h = Harness::new();
    let first = h
        .oauth()
        .execute(google_profile("g-1", "ana@example.com"))
        .await
        .unwrap();

    let mut stale = h.repo.user_by_email("ana@example.com").unwrap();
    let verified_at = stale.email_verified.unwrap();
    stale.verification_token = Some("123456".to_string());
    h.repo.put_user(stale);

    let second = h
        .oauth()
        .execute(google_profile("g-1", "ana@example.com"))
        .await
        .unwrap();

    assert_eq!(second.identity.user_id, first.identity.user_id);
    let stored = h.repo.user_by_email("ana@example.com").unwrap();
    assert!(stored.verification_token.is_none());
    assert_eq!(stored.email_verified, Some(verified_at));
}

#[tokio::test]
async fn test_oauth_rejects_profile_without_email() {
    let h = Harness::new();
    assert!(matches!(
        h.oauth().execute(google_profile("g-1", "")).await,
        Err(AuthError::OAuthProvider(_))
    ));
    assert_eq!(h.repo.user_count(), 0);
}

// ============================================================================
// Password reset
// ============================================================================

#[tokio::test]
async fn test_second_reset_request_invalidates_first() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);

    h.reset().request("ana@example.com").await.unwrap();
    h.reset().request("ana@example.com").await.unwrap();
    let tokens = h.mailer.reset_tokens("ana@example.com");
    assert_eq!(tokens.len(), 2);

    assert!(matches!(
        h.reset().reset(&tokens[0], "Porto-Harbour-77".into()).await,
        Err(AuthError::InvalidOrExpiredResetToken)
    ));
    h.reset().reset(&tokens[1], "Porto-Harbour-77".into()).await.unwrap();

    h.sign_in()
        .execute(credentials("ana@example.com", "Porto-Harbour-77", false))
        .await
        .unwrap();
    assert!(matches!(
        h.sign_in().execute(credentials("ana@example.com", PASSWORD, false)).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_reset_token_expires_after_one_hour() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);
    let issued_at = Utc::now();

    h.reset().request_at("ana@example.com", issued_at).await.unwrap();
    let token = h.mailer.reset_tokens("ana@example.com").remove(0);

    let late = issued_at + Duration::seconds(3601);
    assert!(matches!(
        h.reset().reset_at(&token, "Porto-Harbour-77".into(), late).await,
        Err(AuthError::InvalidOrExpiredResetToken)
    ));

    // Still valid just inside the hour
    let in_time = issued_at + Duration::seconds(3599);
    h.reset()
        .reset_at(&token, "Porto-Harbour-77".into(), in_time)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reset_token_is_single_use() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);

    h.reset().request("ana@example.com").await.unwrap();
    let token = h.mailer.reset_tokens("ana@example.com").remove(0);

    h.reset().reset(&token, "Porto-Harbour-77".into()).await.unwrap();
    assert!(matches!(
        h.reset().reset(&token, "Madeira-Cliffs-31".into()).await,
        Err(AuthError::InvalidOrExpiredResetToken)
    ));

    let stored = h.repo.user_by_email("ana@example.com").unwrap();
    assert!(stored.reset_token_digest.is_none());
    assert!(stored.reset_token_expiry.is_none());
}

#[tokio::test]
async fn test_reset_stores_digest_not_token() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);

    h.reset().request("ana@example.com").await.unwrap();
    let token = h.mailer.reset_tokens("ana@example.com").remove(0);
    let stored = h.repo.user_by_email("ana@example.com").unwrap();

    assert_ne!(stored.reset_token_digest.as_deref(), Some(token.as_str()));
    assert_eq!(
        stored.reset_token_digest,
        Some(ResetToken::from_submitted(token).digest())
    );
}

#[tokio::test]
async fn test_reset_request_is_silent_without_password_account() {
    let h = Harness::new();
    h.oauth()
        .execute(google_profile("g-1", "ana@example.com"))
        .await
        .unwrap();

    h.reset().request("ana@example.com").await.unwrap();
    h.reset().request("nobody@example.com").await.unwrap();

    assert!(h.mailer.reset_tokens("ana@example.com").is_empty());
    assert!(h.mailer.reset_tokens("nobody@example.com").is_empty());
}

#[tokio::test]
async fn test_reset_applies_password_policy() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);
    h.reset().request("ana@example.com").await.unwrap();
    let token = h.mailer.reset_tokens("ana@example.com").remove(0);

    assert!(matches!(
        h.reset().reset(&token, "short".into()).await,
        Err(AuthError::PasswordValidation(_))
    ));
    // The token survives a rejected password
    h.reset().reset(&token, "Porto-Harbour-77".into()).await.unwrap();
}

// ============================================================================
// Session refresh
// ============================================================================

#[tokio::test]
async fn test_valid_token_is_not_reread() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", true);
    let now = Utc::now();
    let claims = h.issuer().mint(&user.identity(), false, now);
    let token = h.issuer().encode(&claims).unwrap();

    // Role change is invisible until the token is due
    let mut promoted = user.clone();
    promoted.user_role = UserRole::Admin;
    h.repo.put_user(promoted);

    let state = h.check().execute_at(Some(&token), now + Duration::hours(1)).await.unwrap();
    assert_eq!(state, SessionState::Current(claims));
}

#[tokio::test]
async fn test_due_token_is_refreshed_from_store() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", true);
    let minted_at = Utc::now() - Duration::days(40);
    let claims = h.issuer().mint(&user.identity(), true, minted_at);
    let token = h.issuer().encode(&claims).unwrap();

    let mut promoted = user.clone();
    promoted.user_role = UserRole::Admin;
    promoted.name = Some("Ana Admin".into());
    h.repo.put_user(promoted);

    let now = Utc::now();
    let SessionState::Refreshed { claims: refreshed, session_token } =
        h.check().execute_at(Some(&token), now).await.unwrap()
    else {
        panic!("expected refresh");
    };

    assert_eq!(refreshed.role, UserRole::Admin);
    assert_eq!(refreshed.name.as_deref(), Some("Ana Admin"));
    assert!(refreshed.remember_me);
    assert_eq!(refreshed.exp, now.timestamp() + 2_592_000);
    assert_eq!(h.issuer().decode(&session_token), Some(refreshed));
}

#[tokio::test]
async fn test_refresh_with_missing_user_keeps_token() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", true);
    let claims = h.issuer().mint(&user.identity(), false, Utc::now() - Duration::days(2));
    let token = h.issuer().encode(&claims).unwrap();
    h.repo.remove_user(&user.user_id);

    let state = h.check().execute(Some(&token)).await.unwrap();
    assert_eq!(state, SessionState::Current(claims));
}

#[tokio::test]
async fn test_tampered_token_is_anonymous() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", true);
    let token = h
        .issuer()
        .encode(&h.issuer().mint(&user.identity(), false, Utc::now()))
        .unwrap();
    let tampered = format!("{token}x");

    assert_eq!(h.check().execute(Some(&tampered)).await.unwrap(), SessionState::Anonymous);
    assert_eq!(h.check().execute(None).await.unwrap(), SessionState::Anonymous);
}

// ============================================================================
// HTTP surface
// ============================================================================

async fn send(app: &Router, req: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(req).await.unwrap()
}

fn get_with_cookie(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn location(resp: &axum::response::Response) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn set_cookies(resp: &axum::response::Response) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn session_cookie_for(h: &Harness, role: UserRole) -> String {
    let mut user = h.seed_password_user(&format!("{}@example.com", role.code().to_lowercase()), true);
    user.user_role = role;
    h.repo.put_user(user.clone());
    let token = h
        .issuer()
        .encode(&h.issuer().mint(&user.identity(), false, Utc::now()))
        .unwrap();
    format!("{}={token}", h.config.session_cookie_name)
}

#[tokio::test]
async fn test_guard_admin_without_token_redirects_to_login() {
    let h = Harness::new();
    let resp = send(&h.app(), get_with_cookie("/admin", None)).await;

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn test_guard_admin_with_user_role_redirects_home() {
    let h = Harness::new();
    let cookie = session_cookie_for(&h, UserRole::User);
    let resp = send(&h.app(), get_with_cookie("/admin", Some(&cookie))).await;

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn test_guard_admin_with_admin_role_passes() {
    let h = Harness::new();
    let cookie = session_cookie_for(&h, UserRole::Admin);
    let resp = send(&h.app(), get_with_cookie("/admin", Some(&cookie))).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_guard_booking_pages_keep_return_path() {
    let h = Harness::new();

    let resp = send(&h.app(), get_with_cookie("/bookings/123", None)).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/login?redirect=%2Fbookings%2F123");

    let resp = send(&h.app(), get_with_cookie("/packages/abc/book", None)).await;
    assert_eq!(location(&resp), "/login?redirect=%2Fpackages%2Fabc%2Fbook");

    let cookie = session_cookie_for(&h, UserRole::User);
    let resp = send(&h.app(), get_with_cookie("/packages/abc/book", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_guard_treats_forged_cookie_as_missing() {
    let h = Harness::new();
    let other = Harness::new();
    let forged = session_cookie_for(&other, UserRole::Admin);
    let forged = forged.replace(&other.config.session_cookie_name, &h.config.session_cookie_name);

    let resp = send(&h.app(), get_with_cookie("/admin", Some(&forged))).await;
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn test_http_sign_in_sets_cookie_by_lifetime_class() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", true);
    let app = h.app();

    let resp = send(
        &app,
        json_post(
            "/api/auth/signin",
            serde_json::json!({ "email": "ana@example.com", "password": PASSWORD, "rememberMe": true }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = set_cookies(&resp);
    assert!(cookies[0].starts_with(&format!("{}=", h.config.session_cookie_name)));
    assert!(cookies[0].contains("Max-Age=2592000"));
    assert!(cookies[0].contains("HttpOnly"));

    let body = json_body(resp).await;
    assert_eq!(body["user"]["email"], "ana@example.com");
    assert_eq!(body["user"]["role"], "USER");

    let resp = send(
        &app,
        json_post(
            "/api/auth/signin",
            serde_json::json!({ "email": "ana@example.com", "password": PASSWORD }),
        ),
    )
    .await;
    assert!(!set_cookies(&resp)[0].contains("Max-Age"));
}

#[tokio::test]
async fn test_http_sign_in_errors_carry_codes() {
    let h = Harness::new();
    h.seed_password_user("ana@example.com", false);
    let app = h.app();

    let resp = send(
        &app,
        json_post(
            "/api/auth/signin",
            serde_json::json!({ "email": "ana@example.com", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(set_cookies(&resp).is_empty());
    assert_eq!(json_body(resp).await["code"], "EMAIL_NOT_VERIFIED");

    let resp = send(&app, json_post("/api/auth/signin", serde_json::json!({}))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_http_session_reports_claims() {
    let h = Harness::new();
    let app = h.app();

    let resp = send(&app, get_with_cookie("/api/auth/session", None)).await;
    assert_eq!(json_body(resp).await["authenticated"], false);

    let cookie = session_cookie_for(&h, UserRole::Admin);
    let resp = send(&app, get_with_cookie("/api/auth/session", Some(&cookie))).await;
    let body = json_body(resp).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["role"], "ADMIN");
}

#[tokio::test]
async fn test_middleware_reissues_cookie_for_due_token() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", true);
    let stale = h
        .issuer()
        .encode(&h.issuer().mint(&user.identity(), true, Utc::now() - Duration::days(31)))
        .unwrap();
    let cookie = format!("{}={stale}", h.config.session_cookie_name);

    let resp = send(&h.app(), get_with_cookie("/", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookies = set_cookies(&resp);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].contains("Max-Age=2592000"));
    assert!(!cookies[0].contains(&stale));
}

#[tokio::test]
async fn test_sign_out_clears_cookie_even_when_due() {
    let h = Harness::new();
    let user = h.seed_password_user("ana@example.com", true);
    let stale = h
        .issuer()
        .encode(&h.issuer().mint(&user.identity(), false, Utc::now() - Duration::days(2)))
        .unwrap();
    let cookie = format!("{}={stale}", h.config.session_cookie_name);

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/signout")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let resp = send(&h.app(), req).await;

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let cookies = set_cookies(&resp);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].contains("Max-Age=0"));
}

#[tokio::test]
async fn test_http_verify_and_reset_round() {
    let h = Harness::new();
    let app = h.app();

    let resp = send(
        &app,
        json_post(
            "/api/auth/signup",
            serde_json::json!({ "name": "Ana", "email": "ana@example.com", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let code = h.mailer.last_code("ana@example.com").unwrap();
    let resp = send(
        &app,
        json_post(
            "/api/auth/verify-email",
            serde_json::json!({ "email": "ana@example.com", "code": code }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(
        &app,
        json_post(
            "/api/auth/password/forgot",
            serde_json::json!({ "email": "ana@example.com" }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let token = h.mailer.reset_tokens("ana@example.com").remove(0);
    let resp = send(
        &app,
        json_post(
            "/api/auth/password/reset",
            serde_json::json!({ "token": token, "password": "Porto-Harbour-77" }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(
        &app,
        json_post(
            "/api/auth/password/reset",
            serde_json::json!({ "token": token, "password": "Porto-Harbour-77" }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "INVALID_OR_EXPIRED_RESET_TOKEN");
}

#[tokio::test]
async fn test_unknown_oauth_provider_is_not_found() {
    let h = Harness::new();
    let resp = send(&h.app(), get_with_cookie("/api/auth/oauth/myspace", None)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oauth_callback_failure_redirects_to_login() {
    let h = Harness::new();
    let resp = send(
        &h.app(),
        get_with_cookie("/api/auth/oauth/google/callback?code=x&state=y", None),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?error=OAuthSignin");
}
