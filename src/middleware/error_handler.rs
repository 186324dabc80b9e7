use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

const MAX_LOGGED_BODY: usize = 4096;

pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let response = next.run(req).await;
    let status = response.status();

    if status.is_client_error() {
        debug!("{} {} -> {}", method, path, status);
        return response;
    }
    if !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            error!("{} {} -> {} (unreadable body: {})", method, path, status, e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    error!(
        "{} {} -> {}, body: {}",
        method,
        path,
        status,
        String::from_utf8_lossy(&bytes)
    );

    // body was consumed, rebuild it
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
