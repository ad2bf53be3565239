use std::sync::Arc;

use actix_web::http::header::ContentType;
use actix_web::{HttpRequest, HttpResponse, Responder, get, post, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::auth::TokenVerifier;
use crate::app::services::{
    DeviceEventCommandHandler, DeviceEventQueryHandler, ServiceError, StoreEventService,
};
use crate::domain::aggregation::Interval;
use crate::domain::debug_page;
use crate::domain::models::{Device, EventType, format_timestamp};

const AUTH_TOKEN_HEADER: &str = "auth-token";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct ApiState {
    pub events: StoreEventService,
    pub token_verifier: Arc<dyn TokenVerifier>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub device_id: i64,
    pub created_at: String,
    pub event_type: EventType,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OutcomeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClientQuery {
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    pub interval: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddDeviceForm {
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "MACAddress")]
    pub mac_address: Option<String>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(default_endpoint)
        .service(register_event_endpoint)
        .service(debug_preview_endpoint)
        .service(data_dump_endpoint)
        .service(list_client_devices_endpoint)
        .service(device_count_endpoint)
        .service(device_count_history_endpoint)
        .service(add_device_endpoint);
}

#[get("/")]
async fn default_endpoint() -> impl Responder {
    plain_text(HttpResponse::Ok(), "Invalid Endpoint")
}

#[post("/register_event")]
async fn register_event_endpoint(
    state: web::Data<ApiState>,
    request: HttpRequest,
    body: web::Bytes,
) -> impl Responder {
    if !is_authorized(&state, &request) {
        return unauthorized();
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return plain_text(
                HttpResponse::BadRequest(),
                "JSON malformed (JSON cannot be decoded)",
            );
        }
    };

    let (Some(event_type), Some(device_id)) = (payload.get("eventType"), payload.get("deviceID"))
    else {
        return plain_text(
            HttpResponse::BadRequest(),
            "JSON malformed (Missing required key in object)",
        );
    };

    let Some(event_type) = event_type.as_str() else {
        return plain_text(
            HttpResponse::BadRequest(),
            "JSON malformed (eventType must be a string)",
        );
    };

    let Some(device_id) = json_integer(device_id) else {
        return plain_text(HttpResponse::BadRequest(), "deviceID must be an integer");
    };

    match state
        .events
        .register_event(device_id, EventType::from_raw(event_type))
    {
        Ok(()) => plain_text(HttpResponse::Ok(), "register_event success"),
        Err(error) => {
            tracing::error!(device_id, error = %error, "failed to register event");
            plain_text(HttpResponse::InternalServerError(), "register_event failed")
        }
    }
}

#[get("/debug_preview")]
async fn debug_preview_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<PreviewQuery>,
) -> impl Responder {
    let device_id = match parse_integer(query.id.as_deref(), "id") {
        Ok(value) => value,
        Err(response) => return response,
    };

    match state.events.list_device_events(device_id) {
        Ok(events) => HttpResponse::Ok()
            .content_type(ContentType::html())
            .body(debug_page::render(device_id, &events)),
        Err(error) => {
            tracing::error!(device_id, error = %error, "debug preview query failed");
            plain_text(
                HttpResponse::InternalServerError(),
                &format!("Error: {error}"),
            )
        }
    }
}

#[get("/data_dump")]
async fn data_dump_endpoint(state: web::Data<ApiState>, request: HttpRequest) -> impl Responder {
    if !is_authorized(&state, &request) {
        return unauthorized();
    }

    match state.events.list_all_events() {
        Ok(events) => {
            let mapped: Vec<EventResponse> = events
                .into_iter()
                .map(|event| EventResponse {
                    device_id: event.device_id,
                    created_at: format_timestamp(&event.created_at),
                    event_type: event.event_type,
                })
                .collect();
            HttpResponse::Ok().json(mapped)
        }
        Err(error) => service_error_response(error),
    }
}

#[get("/GetAllClientDevices")]
async fn list_client_devices_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<ClientQuery>,
) -> impl Responder {
    let client_id = match parse_integer(query.client_id.as_deref(), "client_id") {
        Ok(value) => value,
        Err(response) => return response,
    };

    match state.events.list_client_devices(client_id) {
        Ok(device_ids) => HttpResponse::Ok().json(device_ids),
        Err(error) => service_error_response(error),
    }
}

#[get("/GetDeviceCount")]
async fn device_count_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<DeviceQuery>,
) -> impl Responder {
    let device_id = match parse_integer(query.device_id.as_deref(), "device_id") {
        Ok(value) => value,
        Err(response) => return response,
    };

    match state.events.count_device_today(device_id) {
        Ok(count) => HttpResponse::Ok().json([count]),
        Err(error) => service_error_response(error),
    }
}

#[get("/GetAllDeviceCountHistory")]
async fn device_count_history_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<HistoryQuery>,
) -> impl Responder {
    let client_id = match parse_integer(query.client_id.as_deref(), "client_id") {
        Ok(value) => value,
        Err(response) => return response,
    };

    let interval = match query.interval.as_deref().unwrap_or_default().parse::<Interval>() {
        Ok(value) => value,
        Err(error) => return invalid_input(error.to_string()),
    };

    let reference = match query
        .date
        .as_deref()
        .map(|raw| NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT))
    {
        Some(Ok(value)) => value,
        _ => return invalid_input("date must be formatted as YYYY-MM-DD"),
    };

    match state
        .events
        .device_count_history(client_id, interval, reference)
    {
        Ok(buckets) => HttpResponse::Ok().json(buckets),
        Err(error) => service_error_response(error),
    }
}

#[post("/AddDevice")]
async fn add_device_endpoint(
    state: web::Data<ApiState>,
    form: Result<web::Form<AddDeviceForm>, actix_web::Error>,
) -> impl Responder {
    let form = match form {
        Ok(form) => form.into_inner(),
        Err(error) => {
            tracing::warn!(error = %error, "rejected add device payload");
            return invalid_input("request body must be form encoded");
        }
    };

    let device_id = match parse_integer(form.device_id.as_deref(), "device_id") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let client_id = match form.client_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<i64>() {
            Ok(value) => Some(value),
            Err(_) => return invalid_input("client_id must be an integer"),
        },
    };

    let (Some(name), Some(location), Some(mac_address)) = (
        required_field(form.name),
        required_field(form.location),
        required_field(form.mac_address),
    ) else {
        return invalid_input("name, location and MACAddress are required");
    };

    let device = Device {
        device_id,
        client_id,
        name,
        mac_address,
        location,
    };

    match state.events.add_device(&device) {
        Ok(()) => HttpResponse::Ok().json(OutcomeResponse {
            success: true,
            error: None,
        }),
        Err(error) => service_error_response(error),
    }
}

fn is_authorized(state: &ApiState, request: &HttpRequest) -> bool {
    let token = request
        .headers()
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    state.token_verifier.verify(token)
}

fn unauthorized() -> HttpResponse {
    plain_text(HttpResponse::Unauthorized(), "Unauthorized")
}

fn plain_text(mut builder: actix_web::HttpResponseBuilder, body: &str) -> HttpResponse {
    builder
        .content_type(ContentType::plaintext())
        .body(body.to_string())
}

fn json_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn parse_integer(raw: Option<&str>, name: &str) -> Result<i64, HttpResponse> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| invalid_input(format!("{name} must be an integer")))
}

fn required_field(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn invalid_input(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(OutcomeResponse {
        success: false,
        error: Some(message.into()),
    })
}

fn service_error_response(error: ServiceError) -> HttpResponse {
    match error {
        ServiceError::Aggregation(error) => invalid_input(error.to_string()),
        ServiceError::Database(error) => {
            tracing::error!(error = %error, "store operation failed");
            HttpResponse::InternalServerError().json(OutcomeResponse {
                success: false,
                error: Some(format!("database query failed: {error}")),
            })
        }
    }
}
