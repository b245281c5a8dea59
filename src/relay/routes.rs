//! HTTP surface of a relay instance
//!
//! | Method | Path                                | Role              |
//! |--------|-------------------------------------|-------------------|
//! | POST   | `/stream`, `/stream/`, `/stream.ts` | producer ingest   |
//! | GET    | same                                | consumer egress   |
//! | other  | same                                | 405               |
//! | any    | `/status`                           | JSON status       |
//! | OPTIONS| any                                 | 204 CORS preflight|
//! | any    | anything else                       | 404               |
//!
//! Every response carries permissive CORS headers since viewers are browser
//! pages fetching cross-origin.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use futures_util::StreamExt;

use super::session::IngestOutcome;
use super::state::ChannelState;
use super::status::RelayStatus;
use crate::error::is_disconnect;

/// Paths accepted for the stream endpoint
pub const STREAM_PATHS: [&str; 3] = ["/stream", "/stream/", "/stream.ts"];

/// MPEG transport stream media type sent to consumers
pub const STREAM_CONTENT_TYPE: &str = "video/mp2t";

/// Build the router for one channel
pub fn router(state: Arc<ChannelState>) -> Router {
    let stream = post(ingest).get(egress).fallback(method_not_allowed);

    let mut router = Router::new();
    for path in STREAM_PATHS {
        router = router.route(path, stream.clone());
    }

    router
        .route("/status", any(status))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Producer: forward every body chunk to the consumers until the body ends
async fn ingest(State(state): State<Arc<ChannelState>>, body: Body) -> Response {
    let Some(session) = state.begin_ingest() else {
        tracing::warn!(
            channel = %state.channel_id(),
            "Rejected producer: channel already receiving"
        );
        return (StatusCode::CONFLICT, "channel already has an active producer").into_response();
    };

    let mut chunks = body.into_data_stream();
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(chunk) => {
                session.forward(chunk);
            }
            Err(e) if is_disconnect(&e) => {
                tracing::debug!(channel = %state.channel_id(), error = %e, "Producer disconnected");
                session.finish(IngestOutcome::Disconnected);
                return StatusCode::OK.into_response();
            }
            Err(e) => {
                session.finish(IngestOutcome::Failed(e.to_string()));
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    }

    session.finish(IngestOutcome::Completed);
    StatusCode::OK.into_response()
}

/// Consumer: hold a chunked response open fed by the channel's fan-out
///
/// axum dispatches HEAD to the GET handler; HEAD is not a consumer and gets
/// the same 405 as any other method.
async fn egress(method: Method, State(state): State<Arc<ChannelState>>) -> Response {
    if method == Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let stream = state.attach_consumer();

    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, no-store"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

async fn status(State(state): State<Arc<ChannelState>>) -> Json<RelayStatus> {
    Json(state.status())
}

async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Answer preflights on any path and stamp CORS headers on every response
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );

    response
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::relay::channel::ChannelId;
    use crate::relay::event::{EventBus, RelayEvent};

    fn state() -> Arc<ChannelState> {
        Arc::new(ChannelState::new(
            ChannelId::from("1"),
            9000,
            16,
            EventBus::new(16),
        ))
    }

    fn request(method: Method, path: &str, body: Body) -> Request {
        axum::http::Request::builder()
            .method(method)
            .uri(path)
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_path_not_found() {
        let response = router(state())
            .oneshot(request(Method::GET, "/unknown", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn test_wrong_method_on_stream() {
        for path in STREAM_PATHS {
            let response = router(state())
                .oneshot(request(Method::PUT, path, Body::empty()))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{path}");
        }
    }

    #[tokio::test]
    async fn test_head_on_stream_not_allowed() {
        let state = state();
        let mut events = state.subscribe();

        for path in STREAM_PATHS {
            let response = router(Arc::clone(&state))
                .oneshot(request(Method::HEAD, path, Body::empty()))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{path}");
        }

        assert_eq!(state.consumer_count(), 0);
        assert_eq!(state.stats().consumers_served, 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_options_any_path() {
        for path in ["/stream", "/status", "/anything/else"] {
            let response = router(state())
                .oneshot(request(Method::OPTIONS, path, Body::empty()))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            let headers = response.headers();
            assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert_eq!(
                headers[header::ACCESS_CONTROL_ALLOW_METHODS],
                "GET, POST, OPTIONS"
            );
            assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
            let body = response.into_body().collect().await.unwrap().to_bytes();
            assert!(body.is_empty());
        }
    }

    #[tokio::test]
    async fn test_status_any_method() {
        for method in [Method::GET, Method::POST, Method::DELETE] {
            let response = router(state())
                .oneshot(request(method, "/status", Body::empty()))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = response.into_body().collect().await.unwrap().to_bytes();
            let status: RelayStatus = serde_json::from_slice(&body).unwrap();
            assert_eq!(status.channel_id, ChannelId::from("1"));
            assert!(!status.receiving);
            assert_eq!(status.consumer_count, 0);
        }
    }

    #[tokio::test]
    async fn test_egress_headers_and_lifetime() {
        let state = state();
        let response = router(Arc::clone(&state))
            .oneshot(request(Method::GET, "/stream.ts", Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], STREAM_CONTENT_TYPE);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "no-cache, no-store"
        );
        assert_eq!(state.consumer_count(), 1);

        drop(response);
        assert_eq!(state.consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_ingest_fans_out_body() {
        let state = state();
        let mut events = state.subscribe();
        let consumer = state.attach_consumer();

        let chunks = futures_util::stream::iter(
            [&b"A"[..], b"B", b"C"].map(|c| Ok::<_, std::io::Error>(Bytes::from_static(c))),
        );
        let response = router(Arc::clone(&state))
            .oneshot(request(Method::POST, "/stream/", Body::from_stream(chunks)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state.is_receiving());

        state.close_consumers();
        let received: Vec<Bytes> = consumer.map(|c| c.unwrap()).collect().await;
        assert_eq!(received.concat(), b"ABC");

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&RelayEvent::StreamStarted {
            channel_id: ChannelId::from("1")
        }));
        assert!(seen.contains(&RelayEvent::StreamEnded {
            channel_id: ChannelId::from("1")
        }));
    }

    #[tokio::test]
    async fn test_second_producer_conflict() {
        let state = state();
        let _active = state.begin_ingest().unwrap();

        let response = router(Arc::clone(&state))
            .oneshot(request(Method::POST, "/stream", Body::from("late")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(state.is_receiving());
    }

    #[tokio::test]
    async fn test_ingest_read_error_reports_failure() {
        let state = state();
        let mut events = state.subscribe();

        let chunks = futures_util::stream::iter([
            Ok(Bytes::from_static(b"A")),
            Err(std::io::Error::other("decoder exploded")),
        ]);
        let response = router(Arc::clone(&state))
            .oneshot(request(Method::POST, "/stream", Body::from_stream(chunks)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!state.is_receiving());

        let _started = events.recv().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            RelayEvent::StreamError { .. }
        ));
    }

    #[tokio::test]
    async fn test_ingest_reset_is_clean_disconnect() {
        let state = state();
        let mut events = state.subscribe();

        let chunks = futures_util::stream::iter([
            Ok(Bytes::from_static(b"A")),
            Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
        ]);
        let response = router(Arc::clone(&state))
            .oneshot(request(Method::POST, "/stream", Body::from_stream(chunks)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let _started = events.recv().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            RelayEvent::StreamEnded { .. }
        ));
    }
}
