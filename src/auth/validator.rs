use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use super::hash::Hmac;
use super::password::Passwords;
use super::repo_types::User;
use super::store::{ModelResult, UserDb};
use super::token;
use crate::error::ModelError;

pub const MIN_PASSWORD_CHARS: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,16}$").expect("email regex");
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// One check or normalization applied to a candidate user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    PasswordRequired,
    PasswordMinLength,
    HashPassword,
    PasswordHashRequired,
    SetRememberIfUnset,
    RememberMinBytes,
    HmacRemember,
    RememberHashRequired,
    NormalizeEmail,
    RequireEmail,
    EmailFormat,
    EmailIsAvail,
    PositiveId,
}

// Later steps rely on the earlier ones: hashing clears plaintext, and the
// availability check needs a normalized address.
const CREATE_STEPS: &[Step] = &[
    Step::PasswordRequired,
    Step::PasswordMinLength,
    Step::HashPassword,
    Step::PasswordHashRequired,
    Step::SetRememberIfUnset,
    Step::RememberMinBytes,
    Step::HmacRemember,
    Step::RememberHashRequired,
    Step::NormalizeEmail,
    Step::RequireEmail,
    Step::EmailFormat,
    Step::EmailIsAvail,
];

const UPDATE_STEPS: &[Step] = &[
    Step::PasswordMinLength,
    Step::HashPassword,
    Step::PasswordHashRequired,
    Step::RememberMinBytes,
    Step::HmacRemember,
    Step::RememberHashRequired,
    Step::NormalizeEmail,
    Step::RequireEmail,
    Step::EmailFormat,
    Step::EmailIsAvail,
];

const DELETE_STEPS: &[Step] = &[Step::PositiveId];

/// Validation layer in front of user storage. Owns the layer beneath it.
pub struct UserValidator {
    db: Box<dyn UserDb>,
    hmac: Hmac,
    passwords: Passwords,
}

impl UserValidator {
    pub fn new(db: Box<dyn UserDb>, hmac: Hmac, passwords: Passwords) -> Self {
        Self {
            db,
            hmac,
            passwords,
        }
    }

    async fn run(&self, user: &mut User, steps: &[Step]) -> ModelResult<()> {
        for step in steps {
            self.apply(*step, user).await?;
        }
        Ok(())
    }

    async fn apply(&self, step: Step, user: &mut User) -> ModelResult<()> {
        match step {
            Step::PasswordRequired => {
                if user.password.is_empty() {
                    return Err(ModelError::PasswordRequired);
                }
            }
            Step::PasswordMinLength => {
                if !user.password.is_empty() && user.password.chars().count() < MIN_PASSWORD_CHARS
                {
                    return Err(ModelError::PasswordTooShort);
                }
            }
            Step::HashPassword => {
                if !user.password.is_empty() {
                    let passwords = self.passwords.clone();
                    let plain = std::mem::take(&mut user.password);
                    user.password_hash =
                        tokio::task::spawn_blocking(move || passwords.hash(&plain))
                            .await
                            .context("join password hash task")??;
                }
            }
            Step::PasswordHashRequired => {
                if user.password_hash.is_empty() {
                    return Err(ModelError::PasswordHashRequired);
                }
            }
            Step::SetRememberIfUnset => {
                if user.remember.is_empty() {
                    user.remember = token::remember_token()?;
                }
            }
            Step::RememberMinBytes => {
                if !user.remember.is_empty() {
                    // Undecodable tokens carry no usable entropy.
                    let n = token::n_bytes(&user.remember).unwrap_or(0);
                    if n < token::REMEMBER_TOKEN_BYTES {
                        return Err(ModelError::RememberTooShort);
                    }
                }
            }
            Step::HmacRemember => {
                if !user.remember.is_empty() {
                    user.remember_hash = self.hmac.hash(&user.remember);
                    user.remember.clear();
                }
            }
            Step::RememberHashRequired => {
                if user.remember_hash.is_empty() {
                    return Err(ModelError::RememberRequired);
                }
            }
            Step::NormalizeEmail => {
                user.email = normalize_email(&user.email);
            }
            Step::RequireEmail => {
                if user.email.is_empty() {
                    return Err(ModelError::EmailRequired);
                }
            }
            Step::EmailFormat => {
                if !is_valid_email(&user.email) {
                    return Err(ModelError::EmailInvalid);
                }
            }
            Step::EmailIsAvail => match self.db.by_email(&user.email).await {
                Ok(existing) if existing.id != user.id => return Err(ModelError::EmailTaken),
                Ok(_) | Err(ModelError::NotFound) => {}
                Err(e) => return Err(e),
            },
            Step::PositiveId => {
                if user.id <= 0 {
                    return Err(ModelError::IdInvalid);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserDb for UserValidator {
    async fn by_id(&self, id: i64) -> ModelResult<User> {
        self.db.by_id(id).await
    }

    async fn by_email(&self, email: &str) -> ModelResult<User> {
        self.db.by_email(&normalize_email(email)).await
    }

    /// Looks up by the plaintext remember token.
    async fn by_remember(&self, remember: &str) -> ModelResult<User> {
        self.db.by_remember(&self.hmac.hash(remember)).await
    }

    async fn create(&self, user: &mut User) -> ModelResult<()> {
        self.run(user, CREATE_STEPS).await?;
        self.db.create(user).await
    }

    async fn update(&self, user: &mut User) -> ModelResult<()> {
        self.run(user, UPDATE_STEPS).await?;
        self.db.update(user).await
    }

    async fn delete(&self, id: i64) -> ModelResult<()> {
        let mut user = User {
            id,
            ..User::default()
        };
        self.run(&mut user, DELETE_STEPS).await?;
        self.db.delete(id).await
    }

    async fn migrate(&self) -> ModelResult<()> {
        self.db.migrate().await
    }

    async fn destructive_reset(&self) -> ModelResult<()> {
        self.db.destructive_reset().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::test_cost;
    use crate::auth::store::MemoryUserStore;

    fn validator() -> UserValidator {
        UserValidator::new(
            Box::new(MemoryUserStore::new()),
            Hmac::new("test-hmac").expect("hmac"),
            Passwords::new("test-pepper", test_cost()).expect("passwords"),
        )
    }

    fn candidate(email: &str, password: &str) -> User {
        User {
            name: "Ann".into(),
            email: email.into(),
            password: password.into(),
            ..User::default()
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        for e in ["  Ann@Example.COM ", "bob@x.com", "\tMIXED@Case.Org\n", ""] {
            let once = normalize_email(e);
            assert_eq!(normalize_email(&once), once);
        }
        assert_eq!(normalize_email("  Ann@Example.COM "), "ann@example.com");
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("ann@example.com"));
        assert!(is_valid_email("a.b+tag@mail.example.co"));
        assert!(!is_valid_email("ann@example"));
        assert!(!is_valid_email("ann example@x.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("Ann@Example.com"));
    }

    #[tokio::test]
    async fn create_hashes_and_clears_plaintext() {
        let v = validator();
        let mut u = candidate(" Ann@X.com ", "password123");
        v.create(&mut u).await.expect("create");
        assert!(u.id > 0);
        assert_eq!(u.email, "ann@x.com");
        assert!(u.password.is_empty() && u.remember.is_empty());
        assert!(!u.password_hash.is_empty() && !u.remember_hash.is_empty());
    }

    #[tokio::test]
    async fn missing_password_stops_before_anything_else() {
        let v = validator();
        // bad email too, but the password check runs first
        let mut u = candidate("not-an-email", "");
        let err = v.create(&mut u).await.unwrap_err();
        assert!(matches!(err, ModelError::PasswordRequired));
        assert!(u.password_hash.is_empty() && u.remember_hash.is_empty());
        assert_eq!(u.email, "not-an-email");
    }

    #[tokio::test]
    async fn short_password_rejected() {
        let v = validator();
        let err = v.create(&mut candidate("a@x.com", "short1")).await.unwrap_err();
        assert!(matches!(err, ModelError::PasswordTooShort));
        // counted in characters, not bytes
        let err = v.create(&mut candidate("a@x.com", "ééééééé")).await.unwrap_err();
        assert!(matches!(err, ModelError::PasswordTooShort));
    }

    #[tokio::test]
    async fn supplied_remember_token_must_be_long_enough() {
        let v = validator();
        let mut u = candidate("a@x.com", "password123");
        u.remember = token::string(16).expect("token");
        let err = v.create(&mut u).await.unwrap_err();
        assert!(matches!(err, ModelError::RememberTooShort));

        let mut u = candidate("a@x.com", "password123");
        u.remember = "***".into();
        let err = v.create(&mut u).await.unwrap_err();
        assert!(matches!(err, ModelError::RememberTooShort));
    }

    #[tokio::test]
    async fn supplied_remember_token_is_hashed_with_hmac() {
        let v = validator();
        let token = token::remember_token().expect("token");
        let mut u = candidate("a@x.com", "password123");
        u.remember = token.clone();
        v.create(&mut u).await.expect("create");
        assert_eq!(u.remember_hash, v.hmac.hash(&token));
        assert_eq!(v.by_remember(&token).await.expect("lookup").id, u.id);
    }

    #[tokio::test]
    async fn email_conflicts_are_case_insensitive() {
        let v = validator();
        v.create(&mut candidate("A@X.com", "password123"))
            .await
            .expect("first");
        let err = v
            .create(&mut candidate("a@x.com", "password456"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::EmailTaken));
    }

    #[tokio::test]
    async fn empty_and_malformed_emails() {
        let v = validator();
        let err = v.create(&mut candidate("   ", "password123")).await.unwrap_err();
        assert!(matches!(err, ModelError::EmailRequired));
        let err = v.create(&mut candidate("ann@", "password123")).await.unwrap_err();
        assert!(matches!(err, ModelError::EmailInvalid));
    }

    #[tokio::test]
    async fn update_keeps_own_email_and_existing_hashes() {
        let v = validator();
        let mut u = candidate("a@x.com", "password123");
        v.create(&mut u).await.expect("create");
        let (pw_hash, remember_hash) = (u.password_hash.clone(), u.remember_hash.clone());

        u.name = "Annie".into();
        u.email = "A@X.COM".into();
        v.update(&mut u).await.expect("update");
        assert_eq!(u.password_hash, pw_hash);
        assert_eq!(u.remember_hash, remember_hash);
        assert_eq!(v.by_id(u.id).await.expect("reload").name, "Annie");
    }

    #[tokio::test]
    async fn update_rehashes_new_password_and_token() {
        let v = validator();
        let mut u = candidate("a@x.com", "password123");
        v.create(&mut u).await.expect("create");
        let (pw_hash, remember_hash) = (u.password_hash.clone(), u.remember_hash.clone());

        u.password = "another-password".into();
        u.remember = token::remember_token().expect("token");
        v.update(&mut u).await.expect("update");
        assert_ne!(u.password_hash, pw_hash);
        assert_ne!(u.remember_hash, remember_hash);
        assert!(u.password.is_empty() && u.remember.is_empty());
    }

    #[tokio::test]
    async fn update_rejects_short_password_and_token() {
        let v = validator();
        let mut u = candidate("a@x.com", "password123");
        v.create(&mut u).await.expect("create");

        let mut short_pw = u.clone();
        short_pw.password = "short1".into();
        assert!(matches!(
            v.update(&mut short_pw).await.unwrap_err(),
            ModelError::PasswordTooShort
        ));

        let mut short_token = u.clone();
        short_token.remember = token::string(16).expect("token");
        assert!(matches!(
            v.update(&mut short_token).await.unwrap_err(),
            ModelError::RememberTooShort
        ));
        assert_eq!(
            v.by_id(u.id).await.expect("reload").remember_hash,
            u.remember_hash
        );
    }

    #[tokio::test]
    async fn update_without_any_password_hash_is_rejected() {
        let v = validator();
        let mut u = candidate("a@x.com", "password123");
        v.create(&mut u).await.expect("create");
        u.password_hash.clear();
        assert!(matches!(
            v.update(&mut u).await.unwrap_err(),
            ModelError::PasswordHashRequired
        ));
    }

    #[tokio::test]
    async fn update_cannot_take_another_users_email() {
        let v = validator();
        v.create(&mut candidate("a@x.com", "password123"))
            .await
            .expect("a");
        let mut b = candidate("b@x.com", "password123");
        v.create(&mut b).await.expect("b");
        b.email = "A@x.com".into();
        assert!(matches!(
            v.update(&mut b).await.unwrap_err(),
            ModelError::EmailTaken
        ));
    }

    #[tokio::test]
    async fn delete_requires_positive_existing_id() {
        let v = validator();
        assert!(matches!(v.delete(0).await, Err(ModelError::IdInvalid)));
        assert!(matches!(v.delete(-3).await, Err(ModelError::IdInvalid)));
        assert!(matches!(v.delete(42).await, Err(ModelError::NotFound)));

        let mut u = candidate("a@x.com", "password123");
        v.create(&mut u).await.expect("create");
        v.delete(u.id).await.expect("delete");
        assert!(matches!(v.by_id(u.id).await, Err(ModelError::NotFound)));
    }

    #[tokio::test]
    async fn lookups_normalize_their_keys() {
        let v = validator();
        let mut u = candidate("ann@x.com", "password123");
        v.create(&mut u).await.expect("create");
        assert_eq!(v.by_email("  ANN@x.com").await.expect("lookup").id, u.id);
        assert!(matches!(
            v.by_remember("unknown-token").await,
            Err(ModelError::NotFound)
        ));
    }
}
