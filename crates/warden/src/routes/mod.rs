//! HTTP route handlers for Warden.

use axum::{
    Router,
    routing::{delete, get},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod admin;
mod health;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/metrics", get(health::metrics))

        // Admin endpoints (bind to a private interface in production)
        .nest("/admin", admin_routes())

        .layer(TraceLayer::new_for_http())

        // Add shared state
        .with_state(state)
}

/// Admin routes (chat registry, autopost tasks)
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/chats", get(admin::list_chats))
        .route("/autoposts", get(admin::list_autoposts))
        .route("/autoposts/{task_id}", delete(admin::cancel_autopost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{AutopostInterval, AutopostSpec, Targets};
    use crate::testing::test_state;
    use crate::transport::Payload;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let (state, _transport) = test_state();

        let (status, body) = get_json(create_router(state.clone()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = get_json(create_router(state), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"], true);
    }

    #[tokio::test]
    async fn test_metrics_and_chats() {
        let (state, _transport) = test_state();
        state.registry.register(-100).await.unwrap();

        let (status, body) = get_json(create_router(state.clone()), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["registered_chats"], 1);
        assert_eq!(body["autopost_tasks"], 0);

        let (_, body) = get_json(create_router(state), "/admin/chats").await;
        assert_eq!(body[0]["chat_id"], -100);
        assert_eq!(body[0]["pinning_enabled"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_autopost_over_http() {
        let (state, _transport) = test_state();
        let info = state.autoposts.start(AutopostSpec {
            payload: Payload::text("news"),
            interval: AutopostInterval::from_minutes(5).unwrap(),
            targets: Targets::AllEnabled,
        });

        let (_, body) = get_json(create_router(state.clone()), "/admin/autoposts").await;
        assert_eq!(body[0]["id"], info.id.as_str());

        let uri = format!("/admin/autoposts/{}", info.id);
        let request = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .body(Body::empty())
            .unwrap();
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.autoposts.is_empty());

        let request = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .body(Body::empty())
            .unwrap();
        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
