//! rfs Server
//!
//! Exposes the host filesystem over HTTP: node metadata, raw file content
//! and on-the-fly compressed archives, behind cookie sessions.
//!
//! `rfs-server hash-password [password]` prints an argon2 hash for the
//! credentials file instead of starting the server.

mod config;
mod error;
mod extractors;
mod handlers;
mod services;
mod storage;

use anyhow::{bail, Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use rfs_core::{ArchiveBuilder, ContentStreamer};
use rfs_types::routes;
use std::io::BufRead;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::Config;
use services::{Argon2Verifier, ResourceGateway};
use storage::MemorySessionStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ResourceGateway>,
}

#[tokio::main]
async fn main() {
    // Set up panic hook to log crashes
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[PANIC] at {:?}: {}", location, payload);
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("hash-password") {
        if let Err(e) = print_password_hash(args.next()) {
            eprintln!("[FATAL] {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting rfs server v{}", env!("CARGO_PKG_VERSION"));
    info!("PID: {}", std::process::id());

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

fn print_password_hash(password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        bail!("Password must not be empty");
    }

    println!("{}", services::credentials::hash_password(&password)?);
    Ok(())
}

async fn run_server() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, chunk_size={}, scratch={}",
        config.bind_address,
        config.chunk_size,
        config.scratch_dir.display()
    );

    let scratch = tokio::fs::metadata(&config.scratch_dir)
        .await
        .with_context(|| format!("Cannot stat scratch directory {}", config.scratch_dir.display()))?;
    if !scratch.is_dir() {
        bail!("{} is not a directory", config.scratch_dir.display());
    }

    let credentials = Argon2Verifier::from_file(&config.credentials_file)?;
    if credentials.is_empty() {
        info!("Credentials file has no users; every login will be refused");
    }

    let sessions = Arc::new(MemorySessionStore::new(config.session_ttl));
    let gateway = ResourceGateway::new(
        sessions,
        Arc::new(credentials),
        ContentStreamer::new(config.chunk_size),
        ArchiveBuilder::new(&config.scratch_dir),
    );
    let state = AppState {
        gateway: Arc::new(gateway),
    };

    if let Some(dir) = &config.static_dir {
        info!("Static files directory: {}", dir.display());
    }
    let app = app(state, config.static_dir.as_deref());

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server ready to accept connections");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn app(state: AppState, static_dir: Option<&Path>) -> Router {
    let with_id = |prefix: &str| format!("{}:node_id", prefix);

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route(routes::NODE, get(handlers::node::get_root))
        .route(&with_id(routes::NODE), get(handlers::node::get))
        .route(routes::CONTENT, get(handlers::content::get_root))
        .route(&with_id(routes::CONTENT), get(handlers::content::get))
        .route(routes::ARCHIVE, get(handlers::content::archive_root))
        .route(&with_id(routes::ARCHIVE), get(handlers::content::archive))
        .route(routes::AUTHORITY, post(handlers::authority::login));

    // Single page web client
    if let Some(dir) = static_dir {
        let index = ServeFile::new(dir.join("index.html"));
        router = router.fallback_service(ServeDir::new(dir).fallback(index));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::session::SESSION_COOKIE;
    use crate::services::credentials::cheap_hash;
    use axum::body::{to_bytes, Body};
    use axum::http::header::{
        CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, SET_COOKIE, WWW_AUTHENTICATE,
    };
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use rfs_core::codec;
    use serde_json::Value;
    use std::fs;
    use std::io::Read;
    use std::time::Duration;
    use tower::ServiceExt;

    struct TestServer {
        app: Router,
        tree: tempfile::TempDir,
        scratch: tempfile::TempDir,
    }

    impl TestServer {
        fn new() -> Self {
            let tree = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();

            let demo = tree.path().join("demo");
            fs::create_dir_all(demo.join("sub")).unwrap();
            fs::write(demo.join("a.txt"), b"abcd").unwrap();

            let credentials =
                Argon2Verifier::parse(&format!("alice:{}", cheap_hash("secret"))).unwrap();
            let gateway = ResourceGateway::new(
                Arc::new(MemorySessionStore::new(Duration::from_secs(300))),
                Arc::new(credentials),
                ContentStreamer::new(3),
                ArchiveBuilder::new(scratch.path()),
            );
            let state = AppState {
                gateway: Arc::new(gateway),
            };

            Self {
                app: app(state, None),
                tree,
                scratch,
            }
        }

        fn demo(&self) -> std::path::PathBuf {
            self.tree.path().join("demo")
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.app.clone().oneshot(request).await.unwrap()
        }

        async fn login(&self, password: &str) -> Response {
            let body = serde_json::json!({ "username": "alice", "password": password });
            self.send(
                Request::post(routes::AUTHORITY)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        /// Log in and return the `Cookie` header value for later requests.
        async fn cookie(&self) -> String {
            let response = self.login("secret").await;
            assert_eq!(response.status(), StatusCode::OK);
            let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
            set_cookie.split(';').next().unwrap().to_string()
        }

        async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
            let mut request = Request::get(uri);
            if let Some(cookie) = cookie {
                request = request.header(COOKIE, cookie);
            }
            self.send(request.body(Body::empty()).unwrap()).await
        }

        fn scratch_is_empty(&self) -> bool {
            fs::read_dir(self.scratch.path()).unwrap().next().is_none()
        }
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    fn uri(prefix: &str, path: &Path) -> String {
        format!("{}{}", prefix, codec::encode(path))
    }

    #[tokio::test]
    async fn test_health() {
        let server = TestServer::new();
        let response = server.get("/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_anonymous_request_is_challenged() {
        let server = TestServer::new();
        let response = server.get(&uri(routes::NODE, &server.demo()), None).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            routes::AUTHORITY
        );
        assert_eq!(body_json(response).await["message"], "Authorization Required");
    }

    #[tokio::test]
    async fn test_unknown_session_is_challenged() {
        let server = TestServer::new();
        let cookie = format!("{}=not-a-session", SESSION_COOKIE);
        let response = server.get(routes::NODE, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login() {
        let server = TestServer::new();

        let response = server.login("wrong").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(body_json(response).await["message"], "Wrong username or password");

        let response = server.login("secret").await;
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
        assert!(set_cookie.contains("HttpOnly"));
        assert_eq!(body_json(response).await["message"], "OK, here is a cookie.");
    }

    #[tokio::test]
    async fn test_node_listing() {
        let server = TestServer::new();
        let cookie = server.cookie().await;
        let demo = server.demo();

        let response = server.get(&uri(routes::NODE, &demo), Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let node = body_json(response).await;

        assert_eq!(node["is_dir"], true);
        assert_eq!(node["short_name"], "demo");
        assert_eq!(node["node_id"], codec::encode(&demo));
        assert_eq!(
            node["_links"]["self"],
            uri(routes::NODE, &demo).as_str()
        );

        let files = node["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["short_name"], "a.txt");
        assert_eq!(files[0]["size"], 4);
        assert_eq!(files[0]["mime_type"], "text/plain");
        assert_eq!(
            files[0]["_links"]["download"],
            uri(routes::CONTENT, &demo.join("a.txt")).as_str()
        );

        let dirs = node["dirs"].as_array().unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0]["short_name"], "sub");
        assert_eq!(dirs[0]["is_dir"], true);
    }

    #[tokio::test]
    async fn test_root_node_without_identifier() {
        let server = TestServer::new();
        let cookie = server.cookie().await;

        let response = server.get(routes::NODE, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let node = body_json(response).await;
        assert_eq!(node["short_name"], "ROOT");
        assert_eq!(node["full_name"], "/");
    }

    #[tokio::test]
    async fn test_node_errors() {
        let server = TestServer::new();
        let cookie = server.cookie().await;

        let missing = uri(routes::NODE, &server.demo().join("missing"));
        let response = server.get(&missing, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = server
            .get(&format!("{}%25%25", routes::NODE), Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_undecodable_segment_is_bad_request() {
        let server = TestServer::new();
        let cookie = server.cookie().await;

        for prefix in [routes::NODE, routes::CONTENT, routes::ARCHIVE] {
            let response = server
                .get(&format!("{}%FF%FE", prefix), Some(&cookie))
                .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{prefix}");
        }
        assert!(server.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_content_download() {
        let server = TestServer::new();
        let cookie = server.cookie().await;

        let target = uri(routes::CONTENT, &server.demo().join("a.txt"));
        let response = server.get(&target, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "4");
        assert_eq!(
            headers.get(CONTENT_DISPOSITION).unwrap(),
            "filename=\"a.txt\""
        );
        assert_eq!(body_bytes(response).await, b"abcd");
    }

    #[tokio::test]
    async fn test_content_of_directory_is_not_found() {
        let server = TestServer::new();
        let cookie = server.cookie().await;

        let response = server
            .get(&uri(routes::CONTENT, &server.demo()), Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(server.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_archive_download() {
        let server = TestServer::new();
        let cookie = server.cookie().await;

        let response = server
            .get(&uri(routes::ARCHIVE, &server.demo()), Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_DISPOSITION).unwrap(),
            "filename=\"demo.tgz\""
        );

        let bytes = body_bytes(response).await;
        assert!(server.scratch_is_empty());

        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(bytes.as_slice()));
        let mut found = false;
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap().ends_with("a.txt") {
                let mut contents = String::new();
                entry.read_to_string(&mut contents).unwrap();
                assert_eq!(contents, "abcd");
                found = true;
            }
        }
        assert!(found);
    }

    #[tokio::test]
    async fn test_archive_of_missing_path() {
        let server = TestServer::new();
        let cookie = server.cookie().await;

        let target = uri(routes::ARCHIVE, &server.demo().join("nope"));
        let response = server.get(&target, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(server.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_static_fallback() {
        let server = TestServer::new();
        let site = tempfile::tempdir().unwrap();
        fs::write(site.path().join("index.html"), "<html></html>").unwrap();

        let gateway = ResourceGateway::new(
            Arc::new(MemorySessionStore::new(Duration::from_secs(300))),
            Arc::new(Argon2Verifier::parse("").unwrap()),
            ContentStreamer::default(),
            ArchiveBuilder::new(server.scratch.path()),
        );
        let app = app(
            AppState {
                gateway: Arc::new(gateway),
            },
            Some(site.path()),
        );

        let response = app
            .oneshot(Request::get("/browse/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"<html></html>");
    }
}
