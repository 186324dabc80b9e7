use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::Config;

use super::auth::CART_SESSION_HEADER;

/// Credentialed CORS for the storefront front-end. The cart session cookie only
/// travels cross-origin when credentials are allowed, which in turn rules out
/// wildcard methods and headers.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(CART_SESSION_HEADER),
        ])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::post,
    };
    use tower::ServiceExt;

    use super::*;

    fn app(config: &Config) -> Router {
        Router::new()
            .route("/cart", post(|| async { StatusCode::OK }))
            .layer(cors_layer(config))
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/cart")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, CART_SESSION_HEADER)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn listed_origin_may_send_credentials() {
        let config = Config::new("postgres://localhost/shop", "cors-test-secret");
        let response = app(&config)
            .oneshot(preflight("http://localhost:5173"))
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap();
        assert!(allowed.contains(CART_SESSION_HEADER));
    }

    #[tokio::test]
    async fn unlisted_origin_gets_no_grant() {
        let config = Config::new("postgres://localhost/shop", "cors-test-secret");
        let response = app(&config)
            .oneshot(preflight("https://evil.example"))
            .await
            .unwrap();
        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }

    #[tokio::test]
    async fn empty_origin_list_mirrors_the_caller() {
        let mut config = Config::new("postgres://localhost/shop", "cors-test-secret");
        config.cors_origins.clear();
        let response = app(&config)
            .oneshot(preflight("https://dzclothes.dz"))
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://dzclothes.dz"
        );
    }
}
