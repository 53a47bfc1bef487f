use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2id cost parameters. Tuned per deployment.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PasswordConfig {
    pub time_cost: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            time_cost: 3,
            memory_kib: 19 * 1024,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub ttl_minutes: i64,
    pub url_base: String,
    /// Write full reset links (secret included) to the log. Development only.
    pub log_links: bool,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 15,
            url_base: "http://localhost:3000/reset-password".into(),
            log_links: false,
        }
    }
}

impl ResetConfig {
    pub fn ttl(&self) -> time::Duration {
        time::Duration::minutes(self.ttl_minutes)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub reset: ResetConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "identity-core".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "identity-core-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            time_cost: env_or("PASSWORD_TIME_COST", defaults.time_cost),
            memory_kib: env_or("PASSWORD_MEMORY_KIB", defaults.memory_kib),
            parallelism: env_or("PASSWORD_PARALLELISM", defaults.parallelism),
        };

        let reset_defaults = ResetConfig::default();
        let reset = ResetConfig {
            ttl_minutes: env_or("RESET_TTL_MINUTES", reset_defaults.ttl_minutes),
            url_base: std::env::var("RESET_URL_BASE").unwrap_or(reset_defaults.url_base),
            log_links: env_or("RESET_LOG_LINKS", reset_defaults.log_links),
        };

        Ok(Self {
            database_url,
            jwt,
            password,
            reset,
        })
    }
}
