//! MCP Streamable HTTP endpoint.
//!
//! `POST /mcp` carries one client message per request, `GET /mcp` streams
//! unsolicited server messages, `DELETE /mcp` ends the session.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header::ACCEPT},
    response::{
        IntoResponse, Json, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument, warn};

use crate::api::error::TransportError;
use crate::api::state::AppState;
use crate::auth::{BearerToken, authenticate};
use crate::mcp::SuperthreadServer;
use crate::session::{CloseReason, ExchangeGuard, InboundMessage, Session};

/// Header carrying the session id in both directions.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

const EVENT_STREAM: &str = "text/event-stream";

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// Reply as SSE only when the client accepts event streams and not JSON.
fn wants_event_stream(headers: &HeaderMap) -> bool {
    let accept = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    accept.contains(EVENT_STREAM) && !accept.contains("application/json")
}

fn message_event(value: &Value) -> Event {
    Event::default().event("message").data(value.to_string())
}

fn with_session_header(mut response: Response, session: &Session) -> Response {
    if let Ok(value) = HeaderValue::from_str(session.id().as_str()) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    response
}

/// Find the session for this request, or open one for an initialize message.
fn resolve(
    state: &AppState,
    headers: &HeaderMap,
    message: Option<&InboundMessage>,
    token: &BearerToken,
) -> Result<(Arc<Session>, bool), TransportError> {
    if let Some(id) = session_id(headers) {
        let session = state
            .sessions()
            .get(id)
            .ok_or(TransportError::InvalidSession)?;
        if !session.is_bound_to(token) {
            warn!(session_id = %id, "request token differs from the session's; using the session's");
        }
        return Ok((session, false));
    }

    match message {
        Some(message) if message.is_initialize() => {
            let dispatcher = SuperthreadServer::new(state.client().clone(), token.clone());
            Ok((state.sessions().create(dispatcher, token), true))
        }
        _ => Err(TransportError::HandshakeRejected),
    }
}

/// Submit one JSON-RPC message.
#[instrument(skip_all)]
pub async fn post_mcp(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, TransportError> {
    let token = authenticate(&headers)?;
    let parsed = InboundMessage::parse(&body);
    let (session, created) = resolve(&state, &headers, parsed.as_ref().ok(), &token)?;
    let message = parsed?;

    let reply = match session.deliver(message) {
        Ok(reply) => reply,
        Err(e) => {
            if created {
                session.close(CloseReason::HandshakeFailed);
            }
            return Err(e.into());
        }
    };

    let Some(reply) = reply else {
        debug!(session_id = %session.id(), "message accepted");
        return Ok(with_session_header(
            StatusCode::ACCEPTED.into_response(),
            &session,
        ));
    };

    // A dropped connection drops this future with the guard armed
    let mut guard = ExchangeGuard::arm(&session);
    let outcome = reply.await;
    guard.disarm();

    let value = match outcome {
        Ok(value) => value,
        Err(_) if created => {
            session.close(CloseReason::HandshakeFailed);
            return Err(TransportError::InternalFailure(
                "session closed before the initialize reply".to_string(),
            ));
        }
        Err(_) if !session.is_live() => return Err(TransportError::InvalidSession),
        Err(_) => {
            return Err(TransportError::InternalFailure(
                "dispatcher dropped a pending reply".to_string(),
            ));
        }
    };

    let response = if wants_event_stream(&headers) {
        let event = message_event(&value);
        Sse::new(stream::once(async move { Ok::<_, Infallible>(event) })).into_response()
    } else {
        Json(value).into_response()
    };

    Ok(with_session_header(response, &session))
}

/// Open the server-to-client event stream for a session.
#[instrument(skip_all)]
pub async fn get_mcp(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, TransportError> {
    let session = session_id(&headers)
        .and_then(|id| state.sessions().get(id))
        .ok_or(TransportError::InvalidSession)?;

    debug!(session_id = %session.id(), "event stream opened");

    // The stream holds no strong reference, so it never keeps a session alive
    let messages = session.subscribe();
    let closed = session.signal();

    let events = stream::unfold((messages, closed), |(mut messages, closed)| async move {
        loop {
            tokio::select! {
                _ = closed.cancelled() => return None,
                next = messages.recv() => match next {
                    Ok(value) => {
                        let event = Ok::<_, Infallible>(message_event(&value));
                        return Some((event, (messages, closed)));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event stream fell behind, messages dropped");
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    });

    let response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();
    Ok(with_session_header(response, &session))
}

/// Terminate a session.
#[instrument(skip_all)]
pub async fn delete_mcp(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, TransportError> {
    let session = session_id(&headers)
        .and_then(|id| state.sessions().get(id))
        .ok_or(TransportError::InvalidSession)?;

    session.close(CloseReason::Terminated);
    session.closed().await;

    Ok(StatusCode::OK)
}
