use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::limit::RequestBodyLimitLayer;

use cookbook_core::backup::BACKUP_FILE_NAME;
use cookbook_core::photo::compress_photo_async;
use cookbook_core::selection::{self, EMPTY_PLACEHOLDER, Selection, SortKey};
use cookbook_core::{Cookbook, CookbookError, Recipe, RecipeFields, SqliteStore};

const BODY_LIMIT: usize = 50 * 1024 * 1024; // 50 MB

/// One service instance behind a mutex: at most one call touches the store and
/// the in-memory collection at a time.
#[derive(Clone)]
struct AppState {
    book: Arc<Mutex<Cookbook<SqliteStore>>>,
    api_key: Option<String>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct ListQuery {
    section: Option<String>,
    q: Option<String>,
    sort: Option<String>,
}

#[derive(Serialize)]
struct ListResponse {
    recipes: Vec<Recipe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    placeholder: Option<&'static str>,
}

#[derive(Deserialize)]
struct SaveRecipeRequest {
    id: Option<String>,
    #[serde(flatten)]
    fields: RecipeFields,
}

#[derive(Serialize)]
struct PhotoResponse {
    photo: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unavailable(msg) => {
                tracing::error!(error = %msg, "storage failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage unavailable, changes were not saved".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<CookbookError> for ApiError {
    fn from(err: CookbookError) -> Self {
        match err {
            CookbookError::Storage(msg) => Self::Unavailable(msg),
            CookbookError::NotFound(_) => Self::NotFound(err.to_string()),
            CookbookError::Decode(msg) | CookbookError::Validation(msg) => Self::BadRequest(msg),
        }
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Recipe handlers ---

async fn list_recipes(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Json<ListResponse> {
    let sort: SortKey = params
        .sort
        .as_deref()
        .unwrap_or_default()
        .parse()
        .unwrap_or_default();
    let selection = Selection::new(
        params.section.as_deref().unwrap_or_default(),
        params.q.as_deref().unwrap_or_default(),
        sort,
    );

    let book = state.book.lock().await;
    let recipes: Vec<Recipe> = selection::select(book.recipes(), &selection)
        .into_iter()
        .cloned()
        .collect();
    let placeholder = recipes.is_empty().then_some(EMPTY_PLACEHOLDER);
    Json(ListResponse {
        recipes,
        placeholder,
    })
}

async fn save_recipe(
    State(state): State<AppState>,
    Json(req): Json<SaveRecipeRequest>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    let mut book = state.book.lock().await;
    let existed = req.id.as_deref().is_some_and(|id| book.get(id).is_some());
    let recipe = book.save_record(req.id.as_deref(), req.fields, None).await?;
    let status = if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(recipe)))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    let book = state.book.lock().await;
    Ok(Json(book.require(&id)?.clone()))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut book = state.book.lock().await;
    book.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_recipes(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let mut book = state.book.lock().await;
    book.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Photo handlers ---

async fn upload_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Recipe>, ApiError> {
    let photo = compress_photo_async(body.to_vec()).await?;

    let mut book = state.book.lock().await;
    let fields = book.require(&id)?.fields();
    let recipe = book.save_record(Some(&id), fields, Some(photo)).await?;
    Ok(Json(recipe))
}

async fn transform_photo(body: Bytes) -> Result<Json<PhotoResponse>, ApiError> {
    let photo = compress_photo_async(body.to_vec()).await?;
    Ok(Json(PhotoResponse { photo }))
}

// --- Export / Import handlers ---

async fn export_data(State(state): State<AppState>) -> Result<Response, ApiError> {
    let text = {
        let book = state.book.lock().await;
        book.export_json().await?
    };
    let disposition = format!("attachment; filename=\"{BACKUP_FILE_NAME}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        text,
    )
        .into_response())
}

async fn import_data(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut book = state.book.lock().await;
    let imported = book.import_json(&body).await?;
    Ok(Json(serde_json::json!({ "imported": imported })))
}

// --- Draft handlers ---

async fn get_draft(State(state): State<AppState>) -> Json<Option<RecipeFields>> {
    let book = state.book.lock().await;
    Json(book.draft())
}

async fn put_draft(State(state): State<AppState>, Json(fields): Json<RecipeFields>) -> StatusCode {
    let book = state.book.lock().await;
    book.update_draft(&fields);
    StatusCode::NO_CONTENT
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/recipes",
            get(list_recipes).post(save_recipe).delete(clear_recipes),
        )
        .route(
            "/api/recipes/{id}",
            get(get_recipe).delete(delete_recipe),
        )
        .route("/api/recipes/{id}/photo", put(upload_photo))
        .route("/api/photos", post(transform_photo))
        .route("/api/export", get(export_data))
        .route("/api/import", post(import_data))
        .route("/api/draft", get(get_draft).put(put_draft))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of the key, or a mask for short keys.
fn key_preview(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub async fn start_server(
    book: Cookbook<SqliteStore>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        book: Arc::new(Mutex::new(book)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {} (see api_key file in data directory)",
            key_preview(key)
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!(%bind, port, "cookbook API listening");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
