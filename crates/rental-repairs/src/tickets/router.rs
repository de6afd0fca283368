use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::ACCEPT_LANGUAGE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ApartmentId, NewTicket, TicketId, TransitionPayload, UserId};
use super::error::TicketError;
use super::i18n::Locale;
use super::machine::{RequestContext, TicketStateMachine};
use super::notify::NotificationGateway;
use super::repository::{DamageStore, RepositoryError};
use super::roles::Role;
use super::status::DamageStatus;

pub const ACTOR_HEADER: &str = "x-actor-id";
pub const ROLE_HEADER: &str = "x-actor-role";

#[derive(Debug, Deserialize)]
pub struct OpenTicketRequest {
    pub apartment_id: ApartmentId,
    #[serde(flatten)]
    pub ticket: NewTicket,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    /// Status the caller last observed.
    pub current_status: String,
    pub target: DamageStatus,
    #[serde(flatten)]
    pub payload: TransitionPayload,
}

/// Router exposing ticket creation, transitions, history and read tracking.
/// The acting user and role travel in the `x-actor-id` / `x-actor-role` headers.
pub fn ticket_router<S, N>(machine: Arc<TicketStateMachine<S, N>>) -> Router
where
    S: DamageStore + 'static,
    N: NotificationGateway + 'static,
{
    Router::new()
        .route("/api/v1/tickets", post(open_handler::<S, N>))
        .route(
            "/api/v1/tickets/:ticket_id/transitions",
            post(transition_handler::<S, N>),
        )
        .route(
            "/api/v1/tickets/:ticket_id/history",
            get(history_handler::<S, N>),
        )
        .route("/api/v1/tickets/:ticket_id/read", post(read_handler::<S, N>))
        .with_state(machine)
}

pub(crate) async fn open_handler<S, N>(
    State(machine): State<Arc<TicketStateMachine<S, N>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<OpenTicketRequest>,
) -> Response
where
    S: DamageStore + 'static,
    N: NotificationGateway + 'static,
{
    let ctx = match request_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match machine.open_ticket(&ctx, &request.apartment_id, request.ticket) {
        Ok(outcome) => (StatusCode::CREATED, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn transition_handler<S, N>(
    State(machine): State<Arc<TicketStateMachine<S, N>>>,
    Path(ticket_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    S: DamageStore + 'static,
    N: NotificationGateway + 'static,
{
    let ctx = match request_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match machine.transition(
        &ctx,
        &TicketId::new(ticket_id),
        &request.current_status,
        request.target,
        request.payload,
    ) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<S, N>(
    State(machine): State<Arc<TicketStateMachine<S, N>>>,
    Path(ticket_id): Path<String>,
) -> Response
where
    S: DamageStore + 'static,
    N: NotificationGateway + 'static,
{
    match machine.history(&TicketId::new(ticket_id)) {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn read_handler<S, N>(
    State(machine): State<Arc<TicketStateMachine<S, N>>>,
    Path(ticket_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: DamageStore + 'static,
    N: NotificationGateway + 'static,
{
    let ctx = match request_context(&headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match machine.mark_read(&TicketId::new(ticket_id), &ctx.actor) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

fn request_context(headers: &HeaderMap) -> Result<RequestContext, Response> {
    let actor = header_value(headers, ACTOR_HEADER)
        .ok_or_else(|| bad_request("missing x-actor-id header"))?;
    let role = header_value(headers, ROLE_HEADER)
        .ok_or_else(|| bad_request("missing x-actor-role header"))?
        .parse::<Role>()
        .map_err(|error| bad_request(&error.to_string()))?;
    let ctx = RequestContext::new(UserId::new(actor), role);
    Ok(
        match header_value(headers, ACCEPT_LANGUAGE.as_str()).and_then(Locale::parse) {
            Some(locale) => ctx.with_locale(locale),
            None => ctx,
        },
    )
}

fn header_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn bad_request(message: &str) -> Response {
    let payload = json!({
        "error": message,
    });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn error_response(error: TicketError) -> Response {
    let status = match &error {
        TicketError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        TicketError::StaleState { .. } => StatusCode::CONFLICT,
        TicketError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TicketError::NotFound { .. } => StatusCode::NOT_FOUND,
        TicketError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        TicketError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let mut payload = json!({
        "error": error.to_string(),
    });
    if let TicketError::StaleState { actual, .. } = &error {
        payload["current_status"] = json!(actual.token());
    }
    (status, axum::Json(payload)).into_response()
}
