use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Durable store connection settings. `url` is optional: without it the
/// service runs on the volatile store only.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub connect_timeout_secs: u64,
    pub health_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_attempts: u32,
}

/// argon2 cost knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub database: DatabaseConfig,
    pub rate_limit: RateLimitConfig,
    pub hashing: HashingConfig,
    pub trust_proxy: bool,
    pub development: bool,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "newsdesk".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "newsdesk-readers".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60 * 24 * 7),
        };
        if jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            connect_timeout_secs: env_parse("DATABASE_CONNECT_TIMEOUT_SECS", 5),
            health_interval_secs: env_parse("DATABASE_HEALTH_INTERVAL_SECS", 10),
        };

        let rate_limit = RateLimitConfig {
            window_ms: env_parse("RATE_LIMIT_WINDOW_MS", 15 * 60 * 1000),
            max_attempts: env_parse("RATE_LIMIT_MAX_ATTEMPTS", 5),
        };

        let hashing = HashingConfig {
            memory_kib: env_parse("PASSWORD_HASH_MEMORY_KIB", argon2::Params::DEFAULT_M_COST),
            iterations: env_parse("PASSWORD_HASH_ITERATIONS", argon2::Params::DEFAULT_T_COST),
        };

        Ok(Self {
            jwt,
            database,
            rate_limit,
            hashing,
            trust_proxy: env_parse("TRUST_PROXY", false),
            development: std::env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("development"))
                .unwrap_or(false),
        })
    }
}
