use anyhow::Context;
use serde::Deserialize;

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PasswordCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordCost {
    fn default() -> Self {
        // argon2 crate defaults (OWASP minimum for argon2id)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub pepper: String,
    pub hmac_key: String,
    pub password_cost: PasswordCost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub reset_db: bool,
    pub auth: AuthConfig,
}

const DEV_PEPPER: &str = "dev-pepper";
const DEV_HMAC_KEY: &str = "dev-hmac-key";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "dev".into());
        let in_prod = env == "prod";

        let secret = |name: &str, dev_default: &str| -> anyhow::Result<String> {
            match std::env::var(name) {
                Ok(v) if !v.is_empty() => Ok(v),
                _ if in_prod => anyhow::bail!("{name} must be set when APP_ENV=prod"),
                _ => Ok(dev_default.to_string()),
            }
        };

        let defaults = PasswordCost::default();
        let password_cost = PasswordCost {
            memory_kib: env_parse("ARGON2_MEMORY_KIB")?.unwrap_or(defaults.memory_kib),
            iterations: env_parse("ARGON2_ITERATIONS")?.unwrap_or(defaults.iterations),
            parallelism: env_parse("ARGON2_PARALLELISM")?.unwrap_or(defaults.parallelism),
        };

        let auth = AuthConfig {
            pepper: secret("PEPPER", DEV_PEPPER)?,
            hmac_key: secret("HMAC_KEY", DEV_HMAC_KEY)?,
            password_cost,
        };

        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        if in_prod && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when APP_ENV=prod");
        }

        let reset_db = std::env::var("APP_RESET_DB")
            .map(|v| v == "1" || v == "true")
            .unwrap_or(false);
        if in_prod && reset_db {
            anyhow::bail!("APP_RESET_DB is refused when APP_ENV=prod");
        }

        Ok(Self {
            env,
            database_url,
            max_connections: env_parse("DB_MAX_CONNECTIONS")?.unwrap_or(10),
            reset_db,
            auth,
        })
    }

    pub fn in_prod(&self) -> bool {
        self.env == "prod"
    }
}

fn env_parse<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parse {name}={v}")),
        Err(_) => Ok(None),
    }
}
