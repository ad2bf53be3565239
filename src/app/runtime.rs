use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::db::EventStore;
use crate::app::auth::AcceptAllTokens;
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::services::StoreEventService;
use crate::domain::clock::SystemClock;

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let store = EventStore::new(config.store.clone());
    store.ensure_schema().map_err(AppError::database_init)?;

    let api_state = ApiState {
        events: StoreEventService::new(store, Arc::new(SystemClock)),
        token_verifier: Arc::new(AcceptAllTokens),
    };
    let cors_allowed_origin = config.cors_allowed_origin.clone();

    tracing::info!(bind = %config.http_bind, "http server starting");

    let server_result = actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .wrap(build_cors(cors_allowed_origin.as_deref()))
                .app_data(web::Data::new(api_state.clone()))
                .configure(configure_routes)
        })
        .bind(&config.http_bind)?
        .run()
        .await
    });

    tracing::info!("http server stopped");

    server_result.map_err(AppError::runtime)
}

fn build_cors(allowed_origin: Option<&str>) -> Cors {
    match allowed_origin {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allowed_methods(["GET", "POST"])
            .allow_any_header()
            .max_age(3600),
        None => Cors::permissive(),
    }
}
