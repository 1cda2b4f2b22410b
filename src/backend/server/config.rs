/**
 * Server Configuration
 *
 * Environment-driven configuration plus the optional PostgreSQL pool.
 *
 * # Error Handling
 *
 * Configuration problems are logged but never abort startup: without a
 * `DATABASE_URL` the server runs on in-memory stores, which is fine for
 * development and exactly what the tests use.
 */
use sha2::{Digest, Sha256};
use sqlx::PgPool;

/// Default access-token lifetime: 15 minutes.
const DEFAULT_ACCESS_TTL_SECS: u64 = 15 * 60;
/// Default refresh-token lifetime: 7 days.
const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    /// AES-256 key for at-rest encryption of second-factor seeds.
    pub totp_key: [u8; 32],
    pub port: u16,
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from the environment, with development defaults.
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using an insecure development secret");
            "dev-secret-change-me".to_string()
        });

        // The seed-encryption key is either supplied directly (hex) or
        // derived from the JWT secret so a single secret suffices in
        // development.
        let totp_key = match std::env::var("TOTP_KEY")
            .ok()
            .and_then(|v| hex::decode(v).ok())
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        {
            Some(key) => key,
            None => Sha256::digest(format!("{jwt_secret}:totp-seed-key").as_bytes()).into(),
        };

        let port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        Self {
            jwt_secret,
            access_ttl_secs: env_u64("ACCESS_TTL_SECS", DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl_secs: env_u64("REFRESH_TTL_SECS", DEFAULT_REFRESH_TTL_SECS),
            totp_key,
            port,
        }
    }
}

/// Database configuration result: the pool if configured, `None` otherwise.
pub type DatabaseConfig = Option<PgPool>;

/// Load and initialize the database connection pool.
///
/// Reads `DATABASE_URL`, connects, and runs migrations. Returns `None` on
/// any failure; the server then falls back to in-memory stores.
pub async fn load_database() -> DatabaseConfig {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; running on in-memory stores");
            return None;
        }
    };

    tracing::info!("Connecting to database...");
    let pool = match PgPool::connect(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Falling back to in-memory stores");
            return None;
        }
    };

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("Database migrations completed"),
        Err(e) => {
            // Migrations may already be applied; keep going.
            tracing::error!("Failed to run database migrations: {:?}", e);
        }
    }

    Some(pool)
}
