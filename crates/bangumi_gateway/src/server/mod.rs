//! Bangumi Gateway HTTP Server
//!
//! Routes browser requests to the OAuth/session handlers and to the
//! catalog proxy. Every response carries permissive CORS headers.

pub mod auth_handlers;
pub mod catalog_handlers;
pub mod error;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router as AxumRouter,
};
use tokio::{net::TcpListener, task::JoinHandle};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::auth::{BangumiOAuthClient, SessionStore, StateStore};
use crate::catalog::CatalogClient;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
pub use error::ApiError;

/// Application state shared across handlers
pub struct AppState {
    pub config: GatewayConfig,
    /// OAuth flow; owns the session and state stores
    pub oauth: BangumiOAuthClient,
    pub catalog: CatalogClient,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let oauth = BangumiOAuthClient::new(
            config.oauth.clone(),
            StateStore::new(config.state_ttl),
            SessionStore::new(config.session_ttl),
            http_client.clone(),
        );
        let catalog = CatalogClient::new(config.api_base_url.clone(), http_client);

        Ok(Self {
            config,
            oauth,
            catalog,
        })
    }

    /// Public origin of this gateway, used to build the OAuth redirect URI
    ///
    /// The configured value wins; otherwise it is reconstructed from the
    /// forwarding headers or `Host`.
    pub fn public_base_url(&self, headers: &HeaderMap) -> Result<String> {
        if let Some(base) = &self.config.public_base_url {
            return Ok(base.to_string());
        }

        let first_value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = first_value("x-forwarded-host")
            .or_else(|| first_value(header::HOST.as_str()))
            .ok_or_else(|| GatewayError::InvalidRequest("missing Host header".to_string()))?;
        let scheme = first_value("x-forwarded-proto").unwrap_or_else(|| "http".to_string());

        Ok(format!("{}://{}", scheme, host))
    }

    /// Drop expired sessions and abandoned OAuth states
    pub fn sweep(&self) {
        let sessions = self.oauth.sessions().sweep();
        let states = self.oauth.states().sweep();
        if sessions + states > 0 {
            debug!("Sweep removed {} sessions and {} states", sessions, states);
        }
    }
}

/// Build the gateway router
///
/// - GET  /api/health
/// - GET  /api/search?q=&type=
/// - GET  /api/anime/:id
/// - GET  /api/subject/:id
/// - GET  /api/auth/bangumi/authorize
/// - POST /api/auth/bangumi/callback
/// - GET  /api/auth/me
/// - POST /api/auth/logout
pub fn build_router(state: Arc<AppState>) -> AxumRouter {
    // Stores are swept before every auth request
    let auth_routes = AxumRouter::new()
        .route("/api/auth/bangumi/authorize", get(auth_handlers::authorize))
        .route(
            "/api/auth/bangumi/callback",
            post(auth_handlers::callback).fallback(auth_handlers::callback_method_not_allowed),
        )
        .route("/api/auth/me", get(auth_handlers::me))
        .route("/api/auth/logout", post(auth_handlers::logout))
        .route("/api/auth/*rest", any(auth_handlers::auth_not_found))
        .route_layer(middleware::from_fn_with_state(state.clone(), sweep_expired));

    AxumRouter::new()
        .route("/api/health", get(health))
        .route("/api/search", get(catalog_handlers::search))
        .route("/api/anime/:id", get(catalog_handlers::anime_detail))
        .route("/api/subject/:id", get(catalog_handlers::subject_detail))
        .merge(auth_routes)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(cors)),
        )
        .with_state(state)
}

/// Start the gateway and serve until Ctrl-C
pub async fn start_server(config: GatewayConfig) -> anyhow::Result<()> {
    let addr = config.listen_addr();
    let state = Arc::new(AppState::new(config)?);

    let sweeper = spawn_sweeper(state.clone());
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("[INFO] Bangumi Gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("[INFO] Bangumi Gateway stopped");
    Ok(())
}

/// Periodically sweep both stores in the background
pub fn spawn_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    let period = state.config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            state.sweep();
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("[INFO] Shutdown signal received");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    GatewayError::NotFound("Not found").into()
}

async fn sweep_expired(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    state.sweep();
    next.run(req).await
}

/// Answer preflights directly and stamp CORS headers on everything else
async fn cors(req: Request, next: Next) -> Response {
    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
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
    use super::*;
    use axum::body::Body;
    use mockito::Matcher;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use url::Url;

    fn test_state(upstream: &str) -> Arc<AppState> {
        let mut config = GatewayConfig::default().with_upstream(Url::parse(upstream).unwrap());
        config.oauth.client_id = "bgm_client".to_string();
        config.oauth.client_secret = "bgm_secret".to_string();
        config.public_base_url = Some(Url::parse("https://app.example").unwrap());
        Arc::new(AppState::new(config).unwrap())
    }

    async fn send(state: &Arc<AppState>, request: axum::http::Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_post(uri: &str, body: Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn bearer(method: Method, uri: &str, token: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_has_cors_headers() {
        let state = test_state("http://127.0.0.1:9");
        let (status, headers, body) = send(&state, get_request("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("application/json"));
    }

    #[tokio::test]
    async fn test_options_short_circuits() {
        let state = test_state("http://127.0.0.1:9");
        let request = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/auth/bangumi/callback")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_unmatched_routes() {
        let state = test_state("http://127.0.0.1:9");

        let (status, _, body) = send(&state, get_request("/api/nothing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Not found"}));

        let (status, _, body) = send(&state, get_request("/api/auth/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Auth endpoint not found"}));
    }

    #[tokio::test]
    async fn test_me_requires_bearer() {
        let state = test_state("http://127.0.0.1:9");

        let (status, _, body) = send(&state, get_request("/api/auth/me")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Unauthorized"}));

        let (status, _, body) = send(&state, bearer(Method::GET, "/api/auth/me", "bogus")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Invalid token"}));
    }

    #[tokio::test]
    async fn test_callback_rejects_get_and_bad_state() {
        let state = test_state("http://127.0.0.1:9");

        let (status, _, body) = send(&state, get_request("/api/auth/bangumi/callback")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Method not allowed");

        let (status, _, body) = send(
            &state,
            json_post("/api/auth/bangumi/callback", json!({"code": "c", "state": "unknown"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Authentication failed");
        assert_eq!(body["message"], "Invalid state parameter");

        let (status, _, body) =
            send(&state, json_post("/api/auth/bangumi/callback", json!({"code": "c"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Authentication failed");
    }

    #[tokio::test]
    async fn test_login_me_logout_flow() {
        let mut server = mockito::Server::new_async().await;
        let state = test_state(&server.url());

        let (status, _, body) = send(&state, get_request("/api/auth/bangumi/authorize")).await;
        assert_eq!(status, StatusCode::OK);
        let authorize_url = Url::parse(body["url"].as_str().unwrap()).unwrap();
        let oauth_state = authorize_url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        server
            .mock("POST", "/oauth/access_token")
            .match_body(Matcher::UrlEncoded(
                "redirect_uri".into(),
                "https://app.example/api/auth/bangumi/callback".into(),
            ))
            .with_status(200)
            .with_body(r#"{"access_token":"at-1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v0/me")
            .match_header("authorization", "Bearer at-1")
            .with_status(200)
            .with_body(json!({"id": 5, "username": "mio", "nickname": "Mio"}).to_string())
            .create_async()
            .await;

        let (status, _, body) = send(
            &state,
            json_post(
                "/api/auth/bangumi/callback",
                json!({"code": "goodcode", "state": oauth_state}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(token.len(), 32);
        assert_eq!(body["user"]["id"], 5);
        assert_eq!(body["user"]["avatar"], "");

        let (status, _, body) = send(&state, bearer(Method::GET, "/api/auth/me", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "mio");

        let (status, _, body) = send(&state, bearer(Method::POST, "/api/auth/logout", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
        assert!(state.oauth.sessions().verify(&token).is_none());

        let (status, _, _) = send(&state, bearer(Method::GET, "/api/auth/me", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_without_token_succeeds() {
        let state = test_state("http://127.0.0.1:9");
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/auth/logout")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
    }

    #[tokio::test]
    async fn test_search_defaults_type_and_reports_upstream_failure() {
        let mut server = mockito::Server::new_async().await;
        let state = test_state(&server.url());

        let ok = server
            .mock("GET", "/search/subject/lain")
            .match_query(Matcher::UrlEncoded("type".into(), "2".into()))
            .with_status(200)
            .with_body(json!({"total": 1, "list": [{"id": 1, "name": "Lain"}]}).to_string())
            .create_async()
            .await;
        let (status, _, body) = send(&state, get_request("/api/search?q=lain&type=")).await;
        ok.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["page"], 1);
        assert_eq!(body["results"][0]["desc"], "No description");

        server
            .mock("GET", "/search/subject/broken")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let (status, _, body) = send(&state, get_request("/api/search?q=broken")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to fetch search results");
        assert_eq!(body["message"], "Bangumi API error: 500");
    }

    #[tokio::test]
    async fn test_detail_routes() {
        let mut server = mockito::Server::new_async().await;
        let state = test_state(&server.url());
        server
            .mock("GET", "/v0/subjects/8")
            .with_status(200)
            .with_body(json!({"id": 8, "name": "Cowboy Bebop", "rating": {"score": 9.0}}).to_string())
            .expect(2)
            .create_async()
            .await;

        let (status, _, body) = send(&state, get_request("/api/anime/8")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rating"], 9.0);
        assert_eq!(body["status"], "Unknown");

        let (status, _, body) = send(&state, get_request("/api/subject/8")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rating"]["score"], 9.0);

        server
            .mock("GET", "/v0/subjects/404")
            .with_status(404)
            .create_async()
            .await;
        let (status, _, body) = send(&state, get_request("/api/subject/404")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to fetch subject details");
    }

    fn test_user() -> crate::types::BangumiUser {
        crate::types::BangumiUser {
            id: 5,
            username: "mio".to_string(),
            nickname: "Mio".to_string(),
            avatar: String::new(),
            sign: String::new(),
            url: "https://bgm.tv/user/mio".to_string(),
        }
    }

    /// Seed one expired and one live entry in each store
    fn seed_stores(state: &AppState) -> String {
        let long_ago = chrono::Utc::now() - chrono::Duration::days(8);
        state.oauth.sessions().issue_at(test_user(), long_ago);
        state
            .oauth
            .states()
            .issue_at("https://app.example/api/auth/bangumi/callback", long_ago);
        state.oauth.states().issue("https://app.example/api/auth/bangumi/callback");
        let live = state.oauth.sessions().issue(test_user());

        assert_eq!(state.oauth.sessions().len(), 2);
        assert_eq!(state.oauth.states().len(), 2);
        live
    }

    #[tokio::test]
    async fn test_auth_requests_sweep_expired_entries() {
        let state = test_state("http://127.0.0.1:9");
        let live = seed_stores(&state);

        let (status, _, _) = send(&state, get_request("/api/auth/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.oauth.sessions().len(), 1);
        assert_eq!(state.oauth.states().len(), 1);
        assert!(state.oauth.sessions().verify(&live).is_some());
    }

    #[tokio::test]
    async fn test_catalog_requests_do_not_sweep() {
        let state = test_state("http://127.0.0.1:9");
        seed_stores(&state);

        let (status, _, _) = send(&state, get_request("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.oauth.sessions().len(), 2);
        assert_eq!(state.oauth.states().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper_runs_each_interval() {
        let config = GatewayConfig {
            sweep_interval: std::time::Duration::from_secs(60),
            ..GatewayConfig::default()
        };
        let state = Arc::new(AppState::new(config).unwrap());
        seed_stores(&state);

        let sweeper = spawn_sweeper(state.clone());

        // Nothing is swept on the immediate first tick
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert_eq!(state.oauth.sessions().len(), 2);
        assert_eq!(state.oauth.states().len(), 2);

        tokio::time::sleep(std::time::Duration::from_secs(31)).await;
        assert_eq!(state.oauth.sessions().len(), 1);
        assert_eq!(state.oauth.states().len(), 1);

        sweeper.abort();
    }

    #[tokio::test]
    async fn test_callback_body_without_content_type() {
        let state = test_state("http://127.0.0.1:9");
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/auth/bangumi/callback")
            .body(Body::from(json!({"code": "c", "state": "unknown"}).to_string()))
            .unwrap();

        let (status, _, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid state parameter");
    }

    #[tokio::test]
    async fn test_login_with_plain_text_callback_body() {
        let mut server = mockito::Server::new_async().await;
        let state = test_state(&server.url());
        let oauth_state = state
            .oauth
            .states()
            .issue("https://app.example/api/auth/bangumi/callback");

        server
            .mock("POST", "/oauth/access_token")
            .with_status(200)
            .with_body(r#"{"access_token":"at-2"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v0/me")
            .with_status(200)
            .with_body(json!({"id": 6, "username": "ritsu"}).to_string())
            .create_async()
            .await;

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/auth/bangumi/callback")
            .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(Body::from(json!({"code": "goodcode", "state": oauth_state}).to_string()))
            .unwrap();

        let (status, _, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "ritsu");
        assert!(state.oauth.sessions().verify(body["token"].as_str().unwrap()).is_some());
    }

    #[test]
    fn test_public_base_url_from_headers() {
        let state = AppState::new(GatewayConfig::default()).unwrap();

        let mut headers = HeaderMap::new();
        assert!(state.public_base_url(&headers).is_err());

        headers.insert(header::HOST, HeaderValue::from_static("localhost:8787"));
        assert_eq!(state.public_base_url(&headers).unwrap(), "http://localhost:8787");

        headers.insert("x-forwarded-host", HeaderValue::from_static("app.example"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        assert_eq!(state.public_base_url(&headers).unwrap(), "https://app.example");
    }
}
