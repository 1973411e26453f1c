// ============================================================================
// Axum Middleware
// ============================================================================
//
// - request_logging: Log all incoming requests
// - csrf_protection: Run the protection gate before any handler logic
//
// ============================================================================

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use http_body_util::LengthLimitError;
use std::sync::Arc;
use std::time::Instant;

use crate::config::MAX_REQUEST_BODY_SIZE;
use crate::context::AppContext;
use crate::csrf::{extract_credential, GateDecision, RequestDescriptor, POSTURE_OVERRIDE_PARAM};
use crate::error::AppError;

/// Request logging middleware
pub async fn request_logging(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    tracing::debug!(
        method = %method,
        path = %path,
        "Incoming request"
    );

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

/// CSRF Protection Middleware
///
/// Builds a request descriptor, asks the gate for a decision and
/// short-circuits with 400/403 on deny. On allow, the `AllowReason` is stored
/// in request extensions for downstream handlers.
///
/// The body is only buffered when the decision depends on the credential
/// (non-exempt path, unsafe method).
pub async fn csrf_protection(
    State(ctx): State<Arc<AppContext>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let mut descriptor = RequestDescriptor {
        method: req.method().clone(),
        path: req.uri().path().to_string(),
        route: req
            .extensions()
            .get::<MatchedPath>()
            .map(|m| m.as_str().to_string()),
        credential: None,
        posture_override: query_param(req.uri().query(), POSTURE_OVERRIDE_PARAM),
    };

    let precheck = ctx.gate.precheck(&descriptor);
    let (decision, mut req) = match precheck {
        Some(decision) => (decision, req),
        None => {
            let (parts, body) = req.into_parts();

            let declared_len = parts
                .headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());
            if declared_len.is_some_and(|len| len > MAX_REQUEST_BODY_SIZE) {
                return Err(AppError::PayloadTooLarge(MAX_REQUEST_BODY_SIZE));
            }

            // Chunked bodies carry no Content-Length; the limit trips while reading
            let bytes = axum::body::to_bytes(body, MAX_REQUEST_BODY_SIZE)
                .await
                .map_err(|e| {
                    if exceeds_length_limit(&e) {
                        AppError::PayloadTooLarge(MAX_REQUEST_BODY_SIZE)
                    } else {
                        AppError::validation("Unreadable request body")
                    }
                })?;

            let credential = extract_credential(&parts.headers, &bytes, &ctx.locations).await;
            if let Some(ref c) = credential {
                tracing::trace!(source = c.source.as_str(), "CSRF credential located");
            }
            descriptor.credential = credential.map(|c| c.value);

            let decision = ctx.gate.evaluate(&descriptor);
            (decision, Request::from_parts(parts, Body::from(bytes)))
        }
    };

    match decision {
        GateDecision::Allow(reason) => {
            tracing::debug!(
                method = %descriptor.method,
                path = %descriptor.path,
                reason = reason.code(),
                "CSRF gate allowed request"
            );
            req.extensions_mut().insert(reason);
            Ok(next.run(req).await)
        }
        GateDecision::Deny(reason) => {
            tracing::warn!(
                method = %descriptor.method,
                path = %descriptor.path,
                reason = reason.code(),
                "CSRF gate denied request"
            );
            Err(AppError::Csrf(reason))
        }
    }
}

fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut current = Some(err as &(dyn std::error::Error + 'static));
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    })
}
