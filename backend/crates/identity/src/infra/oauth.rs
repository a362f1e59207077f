//! OAuth 2.0 authorization-code client
//!
//! Client side only: build the authorization redirect, exchange the returned
//! code for an access token, fetch the userinfo profile. The resulting
//! [`ProviderProfile`] is what the linker consumes.

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::entity::linked_account::ProviderProfile;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    /// Path segment and stored provider name, e.g. `google`
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    /// Absolute callback URL registered with the provider
    pub redirect_uri: String,
}

impl OAuthProviderConfig {
    pub fn google(client_id: String, client_secret: String, redirect_base: &str) -> Self {
        Self {
            name: "google".to_string(),
            client_id,
            client_secret,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
            redirect_uri: format!(
                "{}/api/auth/oauth/google/callback",
                redirect_base.trim_end_matches('/')
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OpenID Connect userinfo claims
#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Clone)]
pub struct OAuthClient {
    config: OAuthProviderConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: OAuthProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn authorize_url(&self, state: &str) -> AuthResult<String> {
        let scope = self.config.scopes.join(" ");
        let url = reqwest::Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::Internal(format!("Invalid authorize URL: {e}")))?;

        Ok(url.into())
    }

    /// Code for access token, access token for profile
    pub async fn exchange(&self, code: &str) -> AuthResult<ProviderProfile> {
        let provider = &self.config.name;

        let token: TokenResponse = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::OAuthProvider(format!("{provider} token exchange: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::OAuthProvider(format!("{provider} token response: {e}")))?;

        let info: UserInfo = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::OAuthProvider(format!("{provider} userinfo: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::OAuthProvider(format!("{provider} userinfo response: {e}")))?;

        profile_from_userinfo(provider, info)
    }
}

fn profile_from_userinfo(provider: &str, info: UserInfo) -> AuthResult<ProviderProfile> {
    if info.email_verified == Some(false) {
        return Err(AuthError::OAuthProvider(format!(
            "{provider} reports the email as unverified"
        )));
    }
    let email = info
        .email
        .ok_or_else(|| AuthError::OAuthProvider(format!("{provider} returned no email")))?;

    Ok(ProviderProfile {
        provider: provider.to_string(),
        provider_account_id: info.sub,
        email,
        name: info.name,
        image: info.picture,
    })
}

/// Configured providers by name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<String, OAuthClient>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, client: OAuthClient) -> Self {
        self.clients.insert(client.name().to_string(), client);
        self
    }

    pub fn get(&self, name: &str) -> AuthResult<&OAuthClient> {
        self.clients
            .get(name)
            .ok_or_else(|| AuthError::UnknownProvider(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google() -> OAuthClient {
        OAuthClient::new(OAuthProviderConfig::google(
            "client-123".into(),
            "secret".into(),
            "https://travel.example.com/",
        ))
    }

    #[test]
    fn test_authorize_url_carries_state_and_callback() {
        let url = google().authorize_url("abc123").unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("state=abc123"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains(
            "redirect_uri=https%3A%2F%2Ftravel.example.com%2Fapi%2Fauth%2Foauth%2Fgoogle%2Fcallback"
        ));
    }

    #[test]
    fn test_unverified_provider_email_rejected() {
        let info = UserInfo {
            sub: "1".into(),
            email: Some("ana@example.com".into()),
            email_verified: Some(false),
            name: None,
            picture: None,
        };
        assert!(matches!(
            profile_from_userinfo("google", info),
            Err(AuthError::OAuthProvider(_))
        ));
    }

    #[test]
    fn test_profile_mapping() {
        let info = UserInfo {
            sub: "10769150350006150715113082367".into(),
            email: Some("ana@example.com".into()),
            email_verified: Some(true),
            name: Some("Ana".into()),
            picture: Some("https://example.com/a.png".into()),
        };
        let profile = profile_from_userinfo("google", info).unwrap();
        assert_eq!(profile.provider, "google");
        assert_eq!(profile.provider_account_id, "10769150350006150715113082367");
        assert_eq!(profile.image.as_deref(), Some("https://example.com/a.png"));
    }

    #[test]
    fn test_registry_unknown_provider() {
        let registry = ProviderRegistry::new().with(google());
        assert!(registry.get("google").is_ok());
        assert!(matches!(registry.get("github"), Err(AuthError::UnknownProvider(_))));
    }
}
