use crate::adapters::db::StoreConfig;
use crate::app::AppError;

const DEFAULT_DB_PATH: &str = "/var/lib/turnstile/turnstile.db";
const DEFAULT_HTTP_BIND: &str = "0.0.0.0:8080";

/// Process configuration, read once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub http_bind: String,
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_bind = non_empty(&lookup, "HTTP_BIND")
            .unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        if !http_bind.contains(':') {
            return Err(AppError::config("HTTP_BIND must be in host:port form"));
        }

        Ok(Self {
            store: StoreConfig {
                db_path: non_empty(&lookup, "DB_PATH")
                    .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            },
            http_bind,
            cors_allowed_origin: non_empty(&lookup, "CORS_ALLOWED_ORIGIN"),
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
