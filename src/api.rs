//! REST API for the layout generator.
//!
//! Thin HTTP adapter around the search: decodes the requested counts, runs the
//! generator and serializes the result. Uses Axum and allows any origin (CORS).

use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::analyzer::{FacadeArea, FacadeDirection, LayoutAnalysis, LayoutParameters};
use crate::catalog::{BlockType, CatalogConstants};
use crate::config::ApiConfig;
use crate::export::{CSV_FILE_NAME, render_csv};
use crate::model::{PlacedBlock, RequiredCounts, RuleLogEntry, RuleStatus};
use crate::search::{
    GenerationConfig, GenerationResult, generate_with_config, generate_with_progress,
};
use crate::types::Vec3;

#[derive(Clone)]
struct ApiState {
    generation: Arc<GenerationConfig>,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>modular-housing API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

/// Upper bound on the attempt budget a single request may ask for.
const MAX_REQUEST_ATTEMPTS: u32 = 100_000;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Embedded Web Assets (HTML, JS)
#[derive(RustEmbed)]
#[folder = "web/"]
struct WebAssets;

fn default_comfort() -> u32 {
    5
}

fn default_transparent() -> u32 {
    3
}

fn default_opaque() -> u32 {
    1
}

/// Request body for `/generate` and `/generate_stream`.
///
/// Missing counts default to 5 Comfort, 3 Transparent and 1 Opaque.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"comfort": 5, "transparent": 3, "opaque": 1}))]
pub struct GenerateRequest {
    #[serde(default = "default_comfort")]
    pub comfort: u32,
    #[serde(default = "default_transparent")]
    pub transparent: u32,
    #[serde(default = "default_opaque")]
    pub opaque: u32,
    /// Overrides the configured outer attempt budget
    #[serde(default)]
    #[schema(nullable = true)]
    pub max_attempts: Option<u32>,
    /// Fixes the random source for a reproducible result
    #[serde(default)]
    #[schema(nullable = true)]
    pub seed: Option<u64>,
}

#[derive(Debug, Error, PartialEq)]
enum RequestError {
    #[error("max_attempts must be between 1 and {max}, got {got}")]
    InvalidAttemptBudget { got: u32, max: u32 },
}

/// A request with its attempt budget applied to the configured search.
#[derive(Debug)]
struct ValidatedGenerateRequest {
    counts: RequiredCounts,
    config: GenerationConfig,
    seed: Option<u64>,
}

impl ValidatedGenerateRequest {
    fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

impl GenerateRequest {
    fn into_validated(
        self,
        base: &GenerationConfig,
    ) -> Result<ValidatedGenerateRequest, RequestError> {
        let counts = RequiredCounts::new(self.comfort, self.transparent, self.opaque);

        let mut config = base.clone();
        if let Some(attempts) = self.max_attempts {
            if attempts == 0 || attempts > MAX_REQUEST_ATTEMPTS {
                return Err(RequestError::InvalidAttemptBudget {
                    got: attempts,
                    max: MAX_REQUEST_ATTEMPTS,
                });
            }
            config.max_overall_attempts = attempts;
        }

        Ok(ValidatedGenerateRequest {
            counts,
            config,
            seed: self.seed,
        })
    }
}

/// Generation result plus a one-line console summary.
#[derive(Serialize, ToSchema)]
pub struct GenerateResponse {
    pub console: String,
    #[serde(flatten)]
    pub result: GenerationResult,
}

impl GenerateResponse {
    fn new(result: GenerationResult, max_overall_attempts: u32) -> Self {
        Self {
            console: result.summary(max_overall_attempts),
            result,
        }
    }
}

/// Request body for `/export_csv`: the `coords` of a successful result.
#[derive(Deserialize, ToSchema)]
pub struct ExportRequest {
    #[serde(default)]
    pub coords: Vec<PlacedBlock>,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn parse_generate_request(
    payload: Result<Json<GenerateRequest>, JsonRejection>,
    base: &GenerationConfig,
) -> Result<ValidatedGenerateRequest, Response> {
    let Json(payload) = payload.map_err(json_deserialize_error)?;
    payload.into_validated(base).map_err(|err| {
        error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid input data",
            err.to_string(),
        )
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_generate, handle_generate_stream, handle_constants, handle_export_csv),
    components(
        schemas(
            GenerateRequest,
            GenerateResponse,
            GenerationResult,
            ExportRequest,
            ErrorResponse,
            PlacedBlock,
            BlockType,
            RuleLogEntry,
            RuleStatus,
            LayoutAnalysis,
            LayoutParameters,
            FacadeArea,
            FacadeDirection,
            Vec3,
            CatalogConstants
        )
    ),
    tags((name = "layout", description = "Modular housing layout generation"))
)]
struct ApiDoc;

fn build_router(generation: GenerationConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState {
        generation: Arc::new(generation),
    };

    Router::new()
        .route("/generate", post(handle_generate))
        .route("/generate_stream", post(handle_generate_stream))
        .route("/constants", get(handle_constants))
        .route("/export_csv", post(handle_export_csv))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .route("/", get(serve_index))
        .route("/{*path}", get(serve_static))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and blocks until it terminates.
pub async fn start_api_server(
    config: ApiConfig,
    generation: GenerationConfig,
) -> std::io::Result<()> {
    let app = build_router(generation);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        tracing::info!("Local access: http://localhost:{}", config.port());
    }
    tracing::info!(
        "Endpoints: POST /generate, POST /generate_stream, GET /constants, POST /export_csv, GET /docs"
    );

    axum::serve(listener, app).await
}

/// Handler for POST /generate.
///
/// Searches for a valid layout for the requested counts. An unsatisfiable request is
/// still a 200 with `success: false`.
#[utoipa::path(
    post,
    path = "/generate",
    request_body = GenerateRequest,
    responses(
        (
            status = 200,
            description = "Search finished (check `success`)",
            body = GenerateResponse
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request",
            body = ErrorResponse
        ),
        (
            status = INTERNAL_SERVER_ERROR,
            description = "The search task aborted",
            body = ErrorResponse
        )
    ),
    tag = "layout"
)]
async fn handle_generate(
    State(state): State<ApiState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let request = match parse_generate_request(payload, &state.generation) {
        Ok(request) => request,
        Err(response) => return response,
    };

    tracing::info!(
        comfort = request.counts.comfort,
        transparent = request.counts.transparent,
        opaque = request.counts.opaque,
        "New generate request"
    );
    let search = tokio::task::spawn_blocking(move || {
        let mut rng = request.rng();
        let result = generate_with_config(request.counts, &request.config, &mut rng);
        GenerateResponse::new(result, request.config.max_overall_attempts)
    });

    match search.await {
        Ok(response) => {
            tracing::info!(
                success = response.result.success,
                attempts = response.result.attempts_used,
                "Generate request finished"
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            tracing::error!("Generation task failed: {}", err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Generation failed",
                err.to_string(),
            )
        }
    }
}

/// Handler for POST /generate_stream (SSE).
///
/// Emits a `progress` event per discarded attempt and a final `result` event
/// carrying the complete response.
#[utoipa::path(
    post,
    path = "/generate_stream",
    request_body = GenerateRequest,
    responses(
        (
            status = 200,
            description = "Streams search progress in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request",
            body = ErrorResponse
        )
    ),
    tag = "layout"
)]
async fn handle_generate_stream(
    State(state): State<ApiState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let request = match parse_generate_request(payload, &state.generation) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<(&'static str, String)>(32);

    tokio::task::spawn_blocking(move || {
        let mut rng = request.rng();
        let result = generate_with_progress(request.counts, &request.config, &mut rng, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver only means the client went away.
                let _ = tx.blocking_send(("progress", json));
            }
        });
        let response = GenerateResponse::new(result, request.config.max_overall_attempts);
        if let Ok(json) = serde_json::to_string(&response) {
            let _ = tx.blocking_send(("result", json));
        }
    });

    let stream = ReceiverStream::new(rx).map(|(name, data)| {
        Ok::<_, std::convert::Infallible>(Event::default().event(name).data(data))
    });
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for GET /constants.
#[utoipa::path(
    get,
    path = "/constants",
    responses((
        status = 200,
        description = "Archetype catalog and grid constants",
        body = CatalogConstants
    )),
    tag = "layout"
)]
async fn handle_constants(State(state): State<ApiState>) -> Response {
    Json(state.generation.catalog.constants()).into_response()
}

/// Handler for POST /export_csv.
///
/// Returns the given coordinates as a CSV attachment.
#[utoipa::path(
    post,
    path = "/export_csv",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "CSV download", content_type = "text/csv", body = String),
        (
            status = BAD_REQUEST,
            description = "No configuration data provided",
            body = ErrorResponse
        ),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid JSON data", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_export_csv(payload: Result<Json<ExportRequest>, JsonRejection>) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    if request.coords.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "No configuration data provided.",
            "coords must contain at least one block",
        );
    }

    let disposition = format!("attachment; filename=\"{}\"", CSV_FILE_NAME);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        render_csv(&request.coords),
    )
        .into_response()
}

/// Serves the index.html main page
async fn serve_index() -> Response {
    match WebAssets::get("index.html") {
        Some(content) => Html(content.data).into_response(),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Serves static assets (JS, CSS, etc.)
async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match WebAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn state() -> ApiState {
        ApiState {
            generation: Arc::new(GenerationConfig::default()),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    fn request(json: &str) -> Result<Json<GenerateRequest>, JsonRejection> {
        Ok(Json(serde_json::from_str(json).expect("Should parse valid JSON")))
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in ["/generate", "/generate_stream", "/constants", "/export_csv"] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {} path",
                path
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        for name in ["GenerateRequest", "GenerateResponse", "PlacedBlock", "ErrorResponse"] {
            assert!(
                components.schemas.contains_key(name),
                "Expected schema '{}' is missing from the OpenAPI document",
                name
            );
        }
    }

    #[test]
    fn generate_request_defaults_when_fields_absent() {
        let request: GenerateRequest = serde_json::from_str("{}").expect("Should parse valid JSON");
        assert_eq!(request.comfort, 5);
        assert_eq!(request.transparent, 3);
        assert_eq!(request.opaque, 1);
        assert_eq!(request.max_attempts, None);
        assert_eq!(request.seed, None);
    }

    #[test]
    fn generate_request_keeps_explicit_values() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"comfort": 2, "transparent": 0, "opaque": 0, "seed": 7}"#)
                .expect("Should parse valid JSON");
        assert_eq!((request.comfort, request.transparent, request.opaque), (2, 0, 0));
        assert_eq!(request.seed, Some(7));
    }

    #[test]
    fn validation_passes_oversized_requests_to_the_search() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"comfort": 40}"#).expect("Should parse valid JSON");
        let validated = request
            .into_validated(&GenerationConfig::default())
            .expect("Should validate successfully");
        assert_eq!(validated.counts, RequiredCounts::new(40, 3, 1));
    }

    #[test]
    fn validation_overrides_attempt_budget() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"max_attempts": 12}"#).expect("Should parse valid JSON");
        let validated = request
            .into_validated(&GenerationConfig::default())
            .expect("Should validate successfully");
        assert_eq!(validated.config.max_overall_attempts, 12);

        let zero: GenerateRequest =
            serde_json::from_str(r#"{"max_attempts": 0}"#).expect("Should parse valid JSON");
        assert_eq!(
            zero.into_validated(&GenerationConfig::default()).unwrap_err(),
            RequestError::InvalidAttemptBudget {
                got: 0,
                max: MAX_REQUEST_ATTEMPTS
            }
        );
    }

    #[tokio::test]
    async fn generate_endpoint_handles_empty_request() {
        let response = handle_generate(
            State(state()),
            request(r#"{"comfort": 0, "transparent": 0, "opaque": 0}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["coords"], serde_json::json!([]));
        assert_eq!(json["analysis"]["main_front"], "N/A");
        assert!(json["console"].as_str().unwrap().starts_with("SUCCESS!"));
    }

    #[tokio::test]
    async fn generate_endpoint_is_reproducible_with_seed() {
        let body = r#"{"comfort": 2, "transparent": 1, "opaque": 0, "seed": 12345}"#;
        let first = body_json(handle_generate(State(state()), request(body)).await).await;
        let second = body_json(handle_generate(State(state()), request(body)).await).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn generate_endpoint_reports_failure_in_body() {
        let response = handle_generate(
            State(state()),
            request(r#"{"comfort": 1, "transparent": 0, "opaque": 0,
                        "max_attempts": 5, "seed": 1}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["attempts_used"], 5);
        assert!(json["analysis"].is_null());
        assert!(!json["log"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_endpoint_reports_oversized_request_as_failure() {
        let response = handle_generate(
            State(state()),
            request(r#"{"comfort": 40, "max_attempts": 7, "seed": 3}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["attempts_used"], 7);
        assert_eq!(json["coords"], serde_json::json!([]));
        assert!(json["analysis"].is_null());
        let log = json["log"].as_array().unwrap();
        assert_eq!(log.len(), 7);
        assert!(log.iter().all(|e| e["rule"] == "Generation Failure"));
        assert!(json["console"].as_str().unwrap().starts_with("FAILURE!"));
    }

    #[tokio::test]
    async fn generate_endpoint_rejects_invalid_attempt_budget() {
        let response = handle_generate(State(state()), request(r#"{"max_attempts": 0}"#)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid input data");
    }

    #[tokio::test]
    async fn constants_endpoint_serves_catalog() {
        let json = body_json(handle_constants(State(state())).await).await;
        assert_eq!(json["GRID_MAX"], 5);
        assert_eq!(json["BLOCK_SIZES"]["Comfort"], serde_json::json!([2, 2, 1]));
    }

    #[tokio::test]
    async fn export_endpoint_requires_coords() {
        let response = handle_export_csv(Ok(Json(ExportRequest { coords: Vec::new() }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn export_endpoint_returns_csv_attachment() {
        let coords: Vec<PlacedBlock> = serde_json::from_str(
            r#"[{"id": 1, "type": "Comfort", "x": 1, "y": 1, "z": 1, "dx": 2, "dy": 2, "dz": 1}]"#,
        )
        .expect("Should parse valid JSON");
        let response = handle_export_csv(Ok(Json(ExportRequest { coords }))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert!(
            response.headers()[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains(CSV_FILE_NAME)
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("Block ID,Type,"));
        assert!(text.contains("1,Comfort,1,1,1,2,2,1"));
    }
}
