use anyhow::Context;
use tracing::{debug, info};

use super::hash::Hmac;
use super::password::Passwords;
use super::repo_types::User;
use super::store::{ModelResult, UserDb};
use super::token;
use super::validator::UserValidator;
use crate::config::AuthConfig;
use crate::error::ModelError;

/// Credential checks and user CRUD, with every write passing through the
/// validation pipeline before it reaches storage.
pub struct UserService {
    db: UserValidator,
    passwords: Passwords,
}

impl UserService {
    pub fn new(storage: Box<dyn UserDb>, cfg: &AuthConfig) -> anyhow::Result<Self> {
        let hmac = Hmac::new(&cfg.hmac_key)?;
        let passwords = Passwords::new(&cfg.pepper, cfg.password_cost)?;
        Ok(Self {
            db: UserValidator::new(storage, hmac, passwords.clone()),
            passwords,
        })
    }

    pub async fn by_email(&self, email: &str) -> ModelResult<User> {
        self.db.by_email(email).await
    }

    /// Resolve a plaintext remember token to its user.
    pub async fn by_remember(&self, token: &str) -> ModelResult<User> {
        self.db.by_remember(token).await
    }

    pub async fn create(&self, user: &mut User) -> ModelResult<()> {
        self.db.create(user).await?;
        info!(user_id = user.id, email = %user.email, "user created");
        Ok(())
    }

    pub async fn update(&self, user: &mut User) -> ModelResult<()> {
        self.db.update(user).await
    }

    pub async fn delete(&self, id: i64) -> ModelResult<()> {
        self.db.delete(id).await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    pub async fn migrate(&self) -> ModelResult<()> {
        self.db.migrate().await
    }

    pub async fn destructive_reset(&self) -> ModelResult<()> {
        self.db.destructive_reset().await
    }

    /// Returns the user only when `password` matches the stored hash.
    ///
    /// Unknown addresses yield `NotFound`, wrong passwords `PasswordIncorrect`.
    pub async fn authenticate(&self, email: &str, password: &str) -> ModelResult<User> {
        let user = self.by_email(email).await?;

        let passwords = self.passwords.clone();
        let plain = password.to_string();
        let stored = user.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || passwords.verify(&plain, &stored))
            .await
            .context("join password verify task")??;

        if !ok {
            debug!(user_id = user.id, "password mismatch");
            return Err(ModelError::PasswordIncorrect);
        }
        Ok(user)
    }

    /// Issue a new remember token for `user`, persist its hash and return
    /// the plaintext for the session cookie.
    pub async fn sign_in(&self, user: &mut User) -> ModelResult<String> {
        let remember = token::remember_token()?;
        user.remember = remember.clone();
        self.update(user).await?;
        debug!(user_id = user.id, "remember token issued");
        Ok(remember)
    }

    /// Replace the stored remember token so any outstanding cookie stops
    /// resolving.
    pub async fn rotate_remember(&self, user: &mut User) -> ModelResult<()> {
        user.remember = token::remember_token()?;
        self.update(user).await
    }
}

#[cfg(test)]
pub(crate) fn test_auth_config() -> AuthConfig {
    AuthConfig {
        pepper: "test-pepper".into(),
        hmac_key: "test-hmac-key".into(),
        password_cost: super::password::test_cost(),
    }
}
