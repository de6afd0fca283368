use crate::infra::{AppState, Machine};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use rental_repairs::tickets::{ticket_router, NotificationGateway};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_service_routes<N>(machine: Arc<Machine<N>>) -> Router
where
    N: NotificationGateway + 'static,
{
    let links = Router::new()
        .route("/api/v1/links/:token", get(link_endpoint::<N>))
        .with_state(machine.clone());

    ticket_router(machine)
        .merge(links)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Resolves a deep-link or invitation token from an email back to its claims.
pub(crate) async fn link_endpoint<N>(
    State(machine): State<Arc<Machine<N>>>,
    Path(token): Path<String>,
) -> Response
where
    N: NotificationGateway + 'static,
{
    match machine.dispatcher().signer().verify(&token, Utc::now()) {
        Ok(claims) => (StatusCode::OK, Json(claims)).into_response(),
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{build_machine, DEMO_APARTMENT};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use rental_repairs::config::WorkflowConfig;
    use rental_repairs::tickets::{
        ApartmentId, LinkClaims, LinkPurpose, RecordingGateway, TicketId,
    };
    use tower::ServiceExt;

    fn router() -> (Router, Arc<Machine<RecordingGateway>>) {
        let machine = Arc::new(
            build_machine(
                &WorkflowConfig::default(),
                Arc::new(RecordingGateway::default()),
            )
            .expect("machine builds"),
        );
        (with_service_routes(machine.clone()), machine)
    }

    fn signed_link(machine: &Machine<RecordingGateway>, expires_in: Duration) -> String {
        machine
            .dispatcher()
            .signer()
            .sign(&LinkClaims {
                ticket_id: TicketId::new("ticket-1"),
                apartment_id: ApartmentId::new(DEMO_APARTMENT),
                subject: "meister-guest".to_string(),
                purpose: LinkPurpose::Invitation,
                expires_at: Utc::now() + expires_in,
            })
            .expect("token signs")
    }

    async fn get_status(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn valid_invitation_link_resolves_to_its_claims() {
        let (router, machine) = router();
        let token = signed_link(&machine, Duration::days(1));

        let (status, body) = get_status(router, &format!("/api/v1/links/{token}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticket_id"], "ticket-1");
        assert_eq!(body["purpose"], "invitation");
    }

    #[tokio::test]
    async fn expired_or_tampered_links_are_refused() {
        let (router, machine) = router();
        let expired = signed_link(&machine, Duration::minutes(-5));
        let (status, body) = get_status(router.clone(), &format!("/api/v1/links/{expired}")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().is_some());

        let valid = signed_link(&machine, Duration::days(1));
        let tampered = format!("x{valid}");
        let (status, _) = get_status(router, &format!("/api/v1/links/{tampered}")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
