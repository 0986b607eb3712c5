use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

mod users;

pub use users::{ADMIN_PASSWORD, ADMIN_USERNAME, UserInfo, UserRole, UserStore};
use users::{RegisterRequest, parse_birthdate};

pub const PATH_USER_REGISTER: &str = "/user-register";
pub const PATH_USER_GET: &str = "/user-get";
pub const PATH_USER_PROMOTE: &str = "/user-promote";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    registrations: Arc<AtomicU64>,
    unauthorized: Arc<AtomicU64>,
    promotions: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }

    pub fn unauthorized(&self) -> u64 {
        self.unauthorized.load(Ordering::Relaxed)
    }

    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct TestServerUrls {
    pub base_url: String,
    pub user_register: String,
    pub user_get: String,
    pub user_promote: String,
}

impl TestServerUrls {
    pub fn new(base_url: String) -> Self {
        Self {
            user_register: format!("{base_url}{PATH_USER_REGISTER}"),
            user_get: format!("{base_url}{PATH_USER_GET}"),
            user_promote: format!("{base_url}{PATH_USER_PROMOTE}"),
            base_url,
        }
    }
}

/// Shared state behind the demo user routes.
#[derive(Debug, Clone, Default)]
pub struct UserService {
    users: Arc<UserStore>,
    stats: TestServerStats,
}

impl UserService {
    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(BASE64.decode(encoded.trim()).ok()?).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn authorize(service: &UserService, headers: &HeaderMap) -> Result<UserRole, Response> {
    basic_credentials(headers)
        .and_then(|(user, pass)| service.users.authenticate(&user, &pass))
        .ok_or_else(|| {
            TestServerStats::inc(&service.stats.unauthorized);
            detail(StatusCode::UNAUTHORIZED, "invalid credentials")
        })
}

fn parse_id(raw: &str) -> Result<u64, Response> {
    raw.parse::<u64>().map_err(|_| {
        detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("id must be an integer, got {raw:?}"),
        )
    })
}

async fn handle_register(State(service): State<UserService>, body: Bytes) -> Response {
    TestServerStats::inc(&service.stats.requests_total);

    let req: RegisterRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => return detail(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
    };
    let Some(birthdate) = parse_birthdate(&req.birthdate) else {
        return detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            "birthdate must be YYYY-MM-DD",
        );
    };

    match service.users.register(req, birthdate) {
        Ok(user) => {
            TestServerStats::inc(&service.stats.registrations);
            (StatusCode::OK, Json(user)).into_response()
        }
        Err(err) => detail(StatusCode::BAD_REQUEST, err.detail()),
    }
}

async fn handle_get(
    State(service): State<UserService>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    TestServerStats::inc(&service.stats.requests_total);

    if let Err(res) = authorize(&service, &headers) {
        return res;
    }

    let user = match (query.get("id"), query.get("username")) {
        (Some(_), Some(_)) => {
            return detail(StatusCode::BAD_REQUEST, "both id and username are provided");
        }
        (None, None) => {
            return detail(
                StatusCode::BAD_REQUEST,
                "neither id nor username are provided",
            );
        }
        (Some(id), None) => match parse_id(id) {
            Ok(id) => service.users.get_by_id(id),
            Err(res) => return res,
        },
        (None, Some(username)) => service.users.get_by_username(username),
    };

    match user {
        Some(user) => (StatusCode::OK, Json(user)).into_response(),
        None => detail(StatusCode::NOT_FOUND, "user not found"),
    }
}

async fn handle_promote(
    State(service): State<UserService>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    TestServerStats::inc(&service.stats.requests_total);

    match authorize(&service, &headers) {
        Ok(UserRole::Admin) => {}
        Ok(UserRole::User) => return detail(StatusCode::FORBIDDEN, "admin role required"),
        Err(res) => return res,
    }

    let Some(raw) = query.get("id") else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "id is required");
    };
    let id = match parse_id(raw) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match service.users.promote(id) {
        Ok(()) => {
            TestServerStats::inc(&service.stats.promotions);
            StatusCode::OK.into_response()
        }
        Err(err) => detail(StatusCode::BAD_REQUEST, err.detail()),
    }
}

pub fn router(service: UserService) -> Router {
    Router::new()
        .route(PATH_USER_REGISTER, post(handle_register))
        .route(PATH_USER_GET, post(handle_get))
        .route(PATH_USER_PROMOTE, post(handle_promote))
        .with_state(service)
}

/// Demo user service bound to an ephemeral localhost port.
pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    urls: TestServerUrls,
    service: UserService,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let service = UserService::default();
        let app = router(service.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        let base_url = format!("http://{addr}");
        let urls = TestServerUrls::new(base_url.clone());

        Ok(Self {
            addr,
            base_url,
            urls,
            service,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
    }

    pub fn stats(&self) -> &TestServerStats {
        self.service.stats()
    }

    pub fn users(&self) -> &UserStore {
        self.service.users()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
