//! Per-request Prometheus metrics

use automarks_common::metrics::RequestMetrics;
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

/// Label for requests that matched no route
const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Label by route template (`/students/{usn}`), not the concrete path
pub fn endpoint_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string())
}

/// Record request count and latency
pub async fn track_requests(request: Request, next: Next) -> Response {
    let tracker = RequestMetrics::start(request.method().as_str(), &endpoint_label(&request));
    let response = next.run(request).await;
    tracker.finish(response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_unmatched_request_label() {
        let request = Request::builder()
            .uri("/students/1SV22AD005")
            .body(Body::empty())
            .unwrap();
        assert_eq!(endpoint_label(&request), "unmatched");
    }
}
