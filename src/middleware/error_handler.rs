use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    middleware::Next,
    response::Response,
};

/// 单次记录的响应体上限，超出部分不读取
const MAX_LOGGED_BODY: usize = 4096;

/// 5xx 响应记录请求方法、路径、状态码和响应体，响应本身原样返回
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let declared_len = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > MAX_LOGGED_BODY) {
        tracing::error!(%method, %path, status = %response.status(), "server error (body not logged)");
        return response;
    }

    let (parts, body) = response.into_parts();
    match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(bytes) => {
            tracing::error!(
                %method,
                %path,
                status = %parts.status,
                body = %String::from_utf8_lossy(&bytes),
                "server error"
            );
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::error!(%method, %path, status = %parts.status, "server error, body unreadable: {}", e);
            let mut parts = parts;
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::empty())
        }
    }
}
