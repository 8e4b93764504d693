//! QuizForge API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Textbook registration and background extraction
//! - Processing status and outline queries
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    routing::get,
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use quizforge_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    metrics::{self, METRICS_PREFIX, PIPELINE_BUCKETS},
    telemetry::init_tracing,
};
use quizforge_ingestion::Pipeline;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub pipeline: Arc<Pipeline<Repository>>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DbPool) -> Self {
        let pipeline = Pipeline::from_config(Repository::new(db.clone()), &config.ingestion);

        Self {
            config,
            db,
            pipeline: Arc::new(pipeline),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config.observability);
    info!("Starting QuizForge API Gateway v{}", quizforge_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    let metrics_handle = install_metrics(&config)?;
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Create app state
    let state = AppState::new(config.clone(), db);

    // Build the router
    let mut app = create_router(state);
    if let Some(handle) = metrics_handle {
        app = app.route("/metrics", get(move || std::future::ready(handle.render())));
    }

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the Prometheus recorder.
///
/// With a metrics port the exporter serves its own listener; otherwise the
/// returned handle is rendered on `/metrics` of the API server.
fn install_metrics(
    config: &AppConfig,
) -> Result<Option<PrometheusHandle>, Box<dyn std::error::Error>> {
    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(format!("{}_pipeline_duration_seconds", METRICS_PREFIX)),
        PIPELINE_BUCKETS,
    )?;

    match config.observability.metrics_port {
        0 => Ok(Some(builder.install_recorder()?)),
        port => {
            builder
                .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
                .install()?;
            info!(port, "Metrics exporter listening");
            Ok(None)
        }
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = match state
        .config
        .server
        .cors_origin
        .as_deref()
        .and_then(|origin| origin.parse::<axum::http::HeaderValue>().ok())
    {
        Some(origin) => CorsLayer::new().allow_origin(origin),
        None => {
            if state.config.server.cors_origin.is_some() {
                warn!("Invalid CORS origin configured, allowing any origin");
            }
            CorsLayer::new().allow_origin(Any)
        }
    }
    .allow_methods(Any)
    .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Textbook endpoints
        .route(
            "/textbooks",
            get(handlers::textbooks::list_textbooks).post(handlers::textbooks::create_textbook),
        )
        .route("/textbooks/{id}/status", get(handlers::textbooks::get_status))
        .route("/textbooks/{id}/chapters", get(handlers::textbooks::list_chapters))
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_metrics));

    // Compose the app
    Router::new()
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use quizforge_common::config::DatabaseConfig;
    use quizforge_common::db::{NewChapter, NewQuestion, NewTextbook};
    use quizforge_common::db::models::QuestionType;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct TestApp {
        state: AppState,
        dir: PathBuf,
    }

    impl Drop for TestApp {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    async fn test_app() -> TestApp {
        let dir = std::env::temp_dir().join(format!("quizforge-gateway-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut config = AppConfig::default();
        config.database = DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", dir.join("test.db").display()),
            ..DatabaseConfig::default()
        };
        config.ingestion.library_dir = dir.display().to_string();

        let db = DbPool::new(&config.database).await.unwrap();
        TestApp {
            state: AppState::new(Arc::new(config), db),
            dir,
        }
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(app.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = test_app().await;

        let (status, body) = send(&app, get_request("/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app, get_request("/v1/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"]["status"], "up");
    }

    #[tokio::test]
    async fn test_list_starts_empty() {
        let app = test_app().await;

        let (status, body) = send(&app, get_request("/v1/textbooks")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_rejects_non_pdf() {
        let app = test_app().await;

        let (status, body) = send(&app, post_json("/v1/textbooks", json!({ "file_path": "notes.docx" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("notes.docx"));
    }

    #[tokio::test]
    async fn test_rejects_missing_file() {
        let app = test_app().await;

        let (status, _) = send(&app, post_json("/v1/textbooks", json!({ "file_path": "absent.pdf" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_library() {
        let app = test_app().await;
        let outside = std::env::temp_dir().join(format!("quizforge-outside-{}.pdf", Uuid::new_v4()));
        std::fs::write(&outside, b"%PDF-1.5").unwrap();

        for file_path in ["/etc/x.pdf", "../x.pdf", outside.to_str().unwrap()] {
            let (status, body) = send(&app, post_json("/v1/textbooks", json!({ "file_path": file_path }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{} was accepted", file_path);
            assert_eq!(body["error"]["code"], "PATH_OUTSIDE_LIBRARY");
        }

        let (_, list) = send(&app, get_request("/v1/textbooks")).await;
        assert_eq!(list, json!([]));

        std::fs::remove_file(&outside).ok();
    }

    #[tokio::test]
    async fn test_unknown_textbook() {
        let app = test_app().await;
        let id = Uuid::new_v4();

        let (status, _) = send(&app, get_request(&format!("/v1/textbooks/{}/status", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get_request(&format!("/v1/textbooks/{}/chapters", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, get_request("/v1/textbooks/not-a-uuid/status")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreadable_pdf_ends_failed() {
        let app = test_app().await;
        std::fs::write(app.dir.join("broken.pdf"), b"not really a pdf").unwrap();

        let (status, body) = send(
            &app,
            post_json("/v1/textbooks", json!({ "file_path": "broken.pdf", "title": "Broken" })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pending");

        let id = body["textbook_id"].as_str().unwrap().to_string();
        let status_uri = format!("/v1/textbooks/{}/status", id);

        let mut last = Value::Null;
        for _ in 0..100 {
            let (_, body) = send(&app, get_request(&status_uri)).await;
            if body["status"] == "failed" {
                last = body;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        assert_eq!(last["status"], "failed");
        assert!(last["failure_reason"].as_str().unwrap().contains("PDF parse error"));
        assert_eq!(last["question_count"], 0);

        let (_, list) = send(&app, get_request("/v1/textbooks")).await;
        assert_eq!(list[0]["title"], "Broken");
        assert_eq!(list[0]["original_name"], "broken.pdf");
    }

    #[tokio::test]
    async fn test_chapters_with_question_counts() {
        let app = test_app().await;
        let repo = Repository::new(app.state.db.clone());

        let textbook = repo
            .create_textbook(NewTextbook {
                filename: format!("{}_physics.pdf", Uuid::new_v4()),
                original_name: "physics.pdf".to_string(),
                title: "Physics".to_string(),
                source_path: "/srv/physics.pdf".to_string(),
                file_size: 1024,
            })
            .await
            .unwrap();

        let ids = repo
            .insert_chapters(
                textbook.id,
                vec![
                    NewChapter { label: "2".into(), title: "Forces".into(), level: 1, page_start: 20, page_end: Some(40) },
                    NewChapter { label: "1".into(), title: "Motion".into(), level: 1, page_start: 3, page_end: Some(19) },
                ],
            )
            .await
            .unwrap();

        let question = |chapter_id: Option<Uuid>, text: &str| NewQuestion {
            textbook_id: textbook.id,
            chapter_id,
            text: text.to_string(),
            kind: QuestionType::ShortAnswer,
            page_number: 21,
            context: String::new(),
            answer: None,
        };
        repo.insert_questions(vec![
            question(Some(ids[0]), "What is a force?"),
            question(Some(ids[0]), "How is force measured?"),
            question(None, "What is covered in this book?"),
        ])
        .await
        .unwrap();

        let (status, body) = send(&app, get_request(&format!("/v1/textbooks/{}/chapters", textbook.id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "Motion");
        assert_eq!(body[0]["question_count"], 0);
        assert_eq!(body[1]["title"], "Forces");
        assert_eq!(body[1]["question_count"], 2);

        let (_, status_body) = send(&app, get_request(&format!("/v1/textbooks/{}/status", textbook.id))).await;
        assert_eq!(status_body["status"], "pending");
        assert_eq!(status_body["question_count"], 3);

        let (_, list) = send(&app, get_request("/v1/textbooks")).await;
        assert_eq!(list[0]["chapter_count"], 2);
    }
}
