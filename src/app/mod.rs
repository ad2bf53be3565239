pub mod auth;
mod config;
mod error;
mod logging;
mod runtime;
pub mod services;

pub use config::AppConfig;
pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let config = AppConfig::from_env()?;

    tracing::info!(
        db_path = %config.store.db_path,
        http_bind = %config.http_bind,
        cors_allowed_origin = ?config.cors_allowed_origin,
        "application bootstrap initialized"
    );

    runtime::run(config)
}
