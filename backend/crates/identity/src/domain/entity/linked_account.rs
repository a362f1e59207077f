//! Linked OAuth Account Entity

use chrono::{DateTime, Utc};
use kernel::id::{LinkedAccountId, UserId};

/// `(provider, provider_account_id)` is unique and belongs to exactly one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    pub account_id: LinkedAccountId,
    pub user_id: UserId,
    pub provider: String,
    pub provider_account_id: String,
    pub created_at: DateTime<Utc>,
}

impl LinkedAccount {
    pub fn new(user_id: UserId, profile: &ProviderProfile, now: DateTime<Utc>) -> Self {
        Self {
            account_id: LinkedAccountId::new(),
            user_id,
            provider: profile.provider.clone(),
            provider_account_id: profile.provider_account_id.clone(),
            created_at: now,
        }
    }
}

/// Profile an identity provider vouched for after a completed code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider: String,
    pub provider_account_id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}
