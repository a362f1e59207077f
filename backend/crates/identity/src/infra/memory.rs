//! In-memory repository
//!
//! Same contract as the PostgreSQL store, including the conditional
//! transitions, each done under one lock. Used by tests and by local runs
//! without `DATABASE_URL`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use parking_lot::Mutex;

use crate::domain::entity::{linked_account::LinkedAccount, user::User};
use crate::domain::repository::{OAuthAccountRepository, UserRepository};
use crate::domain::value_object::{email::Email, user_password::UserPassword};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    accounts: Vec<LinkedAccount>,
}

impl MemoryState {
    fn user_by_email_mut(&mut self, email: &Email) -> Option<&mut User> {
        self.users.values_mut().find(|u| &u.email == email)
    }

    fn insert_user(&mut self, user: &User) -> AuthResult<()> {
        if self.users.values().any(|u| u.email == user.email) {
            return Err(AuthError::EmailTaken);
        }
        self.users.insert(user.user_id, user.clone());
        Ok(())
    }

    fn insert_account(&mut self, account: &LinkedAccount) {
        let linked = self.accounts.iter().any(|a| {
            a.provider == account.provider && a.provider_account_id == account.provider_account_id
        });
        if !linked {
            self.accounts.push(account.clone());
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryIdentityRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a user as-is (fixtures)
    pub fn put_user(&self, user: User) {
        self.state.lock().users.insert(user.user_id, user);
    }

    pub fn remove_user(&self, user_id: &UserId) {
        let mut state = self.state.lock();
        state.users.remove(user_id);
        state.accounts.retain(|a| &a.user_id != user_id);
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        let email = Email::from_db(email.trim().to_lowercase());
        self.state.lock().users.values().find(|u| u.email == email).cloned()
    }

    pub fn linked_accounts(&self, user_id: &UserId) -> Vec<LinkedAccount> {
        self.state
            .lock()
            .accounts
            .iter()
            .filter(|a| &a.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().users.len()
    }
}

impl UserRepository for InMemoryIdentityRepository {
    async fn create(&self, user: &User) -> AuthResult<()> {
        self.state.lock().insert_user(user)
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.state.lock().users.get(user_id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let state = self.state.lock();
        Ok(state.users.values().find(|u| &u.email == email).cloned())
    }

    async fn mark_email_verified(&self, user_id: &UserId, now: DateTime<Utc>) -> AuthResult<bool> {
        let mut state = self.state.lock();
        match state.users.get_mut(user_id) {
            Some(user) if user.email_verified.is_none() || user.verification_token.is_some() => {
                user.email_verified.get_or_insert(now);
                user.verification_token = None;
                user.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn consume_verification(
        &self,
        email: &Email,
        code: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<User>> {
        let mut state = self.state.lock();
        match state.user_by_email_mut(email) {
            Some(user)
                if user.email_verified.is_none()
                    && user.verification_token.as_deref() == Some(code) =>
            {
                user.email_verified = Some(now);
                user.verification_token = None;
                user.updated_at = now;
                Ok(Some(user.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn replace_verification_token(
        &self,
        user_id: &UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.state.lock();
        match state.users.get_mut(user_id) {
            Some(user) if user.email_verified.is_none() => {
                user.verification_token = Some(code.to_string());
                user.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn store_reset_token(
        &self,
        user_id: &UserId,
        digest: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        if let Some(user) = self.state.lock().users.get_mut(user_id) {
            user.reset_token_digest = Some(digest.to_string());
            user.reset_token_expiry = Some(expires_at);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        new_password: &UserPassword,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<UserId>> {
        let mut state = self.state.lock();
        let user = state.users.values_mut().find(|u| {
            u.reset_token_digest.as_deref() == Some(digest)
                && u.reset_token_expiry.is_some_and(|expiry| expiry > now)
        });

        Ok(user.map(|user| {
            user.password_hash = Some(new_password.clone());
            user.reset_token_digest = None;
            user.reset_token_expiry = None;
            user.updated_at = now;
            user.user_id
        }))
    }

    async fn claim_welcome(&self, user_id: &UserId, now: DateTime<Utc>) -> AuthResult<bool> {
        let mut state = self.state.lock();
        match state.users.get_mut(user_id) {
            Some(user) if user.welcome_sent_at.is_none() => {
                user.welcome_sent_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl OAuthAccountRepository for InMemoryIdentityRepository {
    async fn find_by_provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> AuthResult<Option<User>> {
        let state = self.state.lock();
        let user = state
            .accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_account_id == provider_account_id)
            .and_then(|a| state.users.get(&a.user_id))
            .cloned();
        Ok(user)
    }

    async fn link_account(&self, account: &LinkedAccount) -> AuthResult<()> {
        let mut state = self.state.lock();
        if !state.users.contains_key(&account.user_id) {
            return Err(AuthError::Internal("Linked account for unknown user".to_string()));
        }
        state.insert_account(account);
        Ok(())
    }

    async fn create_with_account(&self, user: &User, account: &LinkedAccount) -> AuthResult<()> {
        let mut state = self.state.lock();
        state.insert_user(user)?;
        state.insert_account(account);
        Ok(())
    }
}
