//! REST layer: the full budget request surface over Axum.
//!
//! Public routes handle registration and login (bcrypt + JWT); everything
//! else sits behind the bearer-token middleware, so an unauthenticated
//! request gets a 401 instead of reaching a handler. Every expected invalid
//! input (duplicate month, non-positive amount, missing selection,
//! out-of-range index) maps to a 400 with a JSON message, never a panic.

use axum::{
    extract::{Path, State},
    http::{header, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{Datelike, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::auth::{create_jwt, hash_password, validate_jwt, verify_password};
use crate::book::{BookError, FixedExpense, VariableExpense};
use crate::export::month_csv;
use crate::models::{AuthPayload, Summary};
use crate::storage::{Storage, StorageError};

/// Shared app state for REST handlers (Arc-wrapped for concurrency)
#[derive(Clone)]
pub struct AppState {
    storage: Arc<Storage>,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Serialize, Deserialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

#[derive(Deserialize)]
pub struct CreateMonthRequest {
    pub name: String,
    pub income: Decimal,
}

#[derive(Deserialize)]
pub struct SwitchMonthRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct AddVariableRequest {
    pub description: String,
    pub amount: Decimal,
    pub day: String,
    pub month: String,
}

#[derive(Deserialize)]
pub struct AddFixedRequest {
    pub description: String,
    pub amount: Decimal,
}

#[derive(Serialize, Deserialize)]
pub struct DashboardResponse {
    pub message: String,
    pub current_month: Option<String>,
    pub months: Vec<String>,
    /// Variable expenses of the current month, most recent date first.
    pub expenses: Vec<VariableExpense>,
    pub summary: Option<Summary>,
    pub today_day: String,
    pub today_month: String,
}

/// Recoverable handler failure: status plus a user-facing message body.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<BookError> for ApiError {
    fn from(err: BookError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UserExists(_) => ApiError::bad_request(err.to_string()),
            other => {
                error!(error = %other, "storage failure");
                ApiError::internal("storage failure")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiMessage {
                success: false,
                message: self.message,
            }),
        )
            .into_response()
    }
}

async fn auth_middleware(
    State(_state): State<Arc<AppState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("login required"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("login required"))?;

    let claims =
        validate_jwt(token).map_err(|_| ApiError::unauthorized("invalid or expired token"))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Create the Axum router covering the whole request surface.
pub fn create_router(storage: Storage) -> Router {
    let state = Arc::new(AppState {
        storage: Arc::new(storage),
    });

    let budget_routes = Router::new()
        .route("/dashboard", get(dashboard_handler))
        .route("/months", post(create_month_handler))
        .route(
            "/months/current",
            post(switch_month_handler).delete(delete_month_handler),
        )
        .route("/expenses/variable", post(add_variable_handler))
        .route("/expenses/variable/:index", delete(remove_variable_handler))
        .route(
            "/expenses/fixed",
            get(list_fixed_handler).post(add_fixed_handler),
        )
        .route("/export/csv", get(export_csv_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/health", get(health_handler))
        .merge(budget_routes)
        .with_state(state)
}

fn valid_username(username: &str) -> bool {
    // usernames become file names under books/
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    if !valid_username(&payload.username) {
        return Err(ApiError::bad_request(
            "username may only contain letters, digits, '-' and '_'",
        ));
    }
    let hash = hash_password(&payload.password)
        .map_err(|_| ApiError::internal("could not hash password"))?;
    state.storage.register_user(&payload.username, &hash)?;

    // registration logs the user straight in
    let token = create_jwt(&payload.username)
        .map_err(|_| ApiError::internal("could not issue token"))?;
    Ok(Json(TokenResponse { token }))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    let users = state.storage.load_users();
    let stored = users
        .get(&payload.username)
        .ok_or_else(|| ApiError::unauthorized("wrong username or password"))?;

    if !verify_password(&payload.password, stored).unwrap_or(false) {
        return Err(ApiError::unauthorized("wrong username or password"));
    }

    let token = create_jwt(&payload.username)
        .map_err(|_| ApiError::internal("could not issue token"))?;
    Ok(Json(TokenResponse { token }))
}

async fn health_handler() -> Json<ApiMessage> {
    Json(ApiMessage {
        success: true,
        message: "budgeteer API healthy".to_string(),
    })
}

async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let book = state.storage.load_book(&claims.sub)?;
    let today = Local::now();
    let today_day = format!("{:02}", today.day());
    let today_month = format!("{:02}", today.month());
    let months: Vec<String> = book.months.keys().cloned().collect();

    let response = match book.current_month() {
        None => DashboardResponse {
            message: "no month created yet".to_string(),
            current_month: None,
            months,
            expenses: vec![],
            summary: None,
            today_day,
            today_month,
        },
        Some((name, month)) => DashboardResponse {
            message: format!("current month: {}", name),
            current_month: Some(name.to_string()),
            months,
            expenses: month.variable_by_recent_date(),
            summary: Some(month.summary()),
            today_day,
            today_month,
        },
    };
    Ok(Json(response))
}

async fn create_month_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Json(payload): Json<CreateMonthRequest>,
) -> Result<Json<ApiMessage>, ApiError> {
    let lock = state.storage.user_lock(&claims.sub);
    let _guard = lock.lock().unwrap();

    let mut book = state.storage.load_book(&claims.sub)?;
    book.create_month(&payload.name, payload.income)?;
    state.storage.save_book(&claims.sub, &book)?;

    Ok(Json(ApiMessage {
        success: true,
        message: format!("month '{}' created", payload.name),
    }))
}

async fn switch_month_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Json(payload): Json<SwitchMonthRequest>,
) -> Result<Json<ApiMessage>, ApiError> {
    let lock = state.storage.user_lock(&claims.sub);
    let _guard = lock.lock().unwrap();

    let mut book = state.storage.load_book(&claims.sub)?;
    book.switch_month(&payload.name)?;
    state.storage.save_book(&claims.sub, &book)?;

    Ok(Json(ApiMessage {
        success: true,
        message: format!("current month is now '{}'", payload.name),
    }))
}

async fn delete_month_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
) -> Result<Json<ApiMessage>, ApiError> {
    let lock = state.storage.user_lock(&claims.sub);
    let _guard = lock.lock().unwrap();

    let mut book = state.storage.load_book(&claims.sub)?;
    let deleted = book.delete_month()?;
    state.storage.save_book(&claims.sub, &book)?;

    Ok(Json(ApiMessage {
        success: true,
        message: format!("month '{}' deleted", deleted),
    }))
}

async fn add_variable_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Json(payload): Json<AddVariableRequest>,
) -> Result<Json<ApiMessage>, ApiError> {
    let lock = state.storage.user_lock(&claims.sub);
    let _guard = lock.lock().unwrap();

    let mut book = state.storage.load_book(&claims.sub)?;
    book.add_variable_expense(
        &payload.description,
        payload.amount,
        &payload.day,
        &payload.month,
    )?;
    state.storage.save_book(&claims.sub, &book)?;

    Ok(Json(ApiMessage {
        success: true,
        message: "expense added".to_string(),
    }))
}

async fn remove_variable_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(index): Path<usize>,
) -> Result<Json<ApiMessage>, ApiError> {
    let lock = state.storage.user_lock(&claims.sub);
    let _guard = lock.lock().unwrap();

    let mut book = state.storage.load_book(&claims.sub)?;
    book.remove_variable_expense(index)?;
    state.storage.save_book(&claims.sub, &book)?;

    Ok(Json(ApiMessage {
        success: true,
        message: "expense removed".to_string(),
    }))
}

async fn list_fixed_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
) -> Result<Json<Vec<FixedExpense>>, ApiError> {
    let book = state.storage.load_book(&claims.sub)?;
    Ok(Json(book.fixed_catalog))
}

async fn add_fixed_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Json(payload): Json<AddFixedRequest>,
) -> Result<Json<ApiMessage>, ApiError> {
    let lock = state.storage.user_lock(&claims.sub);
    let _guard = lock.lock().unwrap();

    let mut book = state.storage.load_book(&claims.sub)?;
    book.add_fixed_expense(&payload.description, payload.amount)?;
    state.storage.save_book(&claims.sub, &book)?;

    Ok(Json(ApiMessage {
        success: true,
        message: "fixed expense added".to_string(),
    }))
}

async fn export_csv_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
) -> Result<Response, ApiError> {
    let book = state.storage.load_book(&claims.sub)?;
    let (name, month) = book.current_month().ok_or(BookError::NoCurrentMonth)?;

    let csv = month_csv(month).map_err(|err| {
        error!(error = %err, "CSV export failed");
        ApiError::internal("export failed")
    })?;

    let headers = [
        (
            header::CONTENT_TYPE,
            "text/csv; charset=utf-8".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.csv\"", name),
        ),
    ];
    Ok((headers, csv).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use tempfile::TempDir;
    use tower::ServiceExt; // for .oneshot() testing

    fn test_app() -> (Router, TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = Storage::open(dir.path()).expect("storage for REST test");
        (create_router(storage), dir)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(uri: &str, method: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method(method)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn authed_request(uri: &str, method: &str, token: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .uri(uri)
            .method(method)
            .header("authorization", format!("Bearer {}", token));
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn register(app: &Router, username: &str) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "/register",
                "POST",
                serde_json::json!({ "username": username, "password": "secret" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn budget_routes_require_a_token() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn double_registration_is_rejected() {
        let (app, _dir) = test_app();
        register(&app, "maria").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "/register",
                "POST",
                serde_json::json!({ "username": "maria", "password": "other" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_unauthorized() {
        let (app, _dir) = test_app();
        register(&app, "maria").await;

        let response = app
            .clone()
            .oneshot(json_request(
                "/login",
                "POST",
                serde_json::json!({ "username": "maria", "password": "wrong" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(json_request(
                "/login",
                "POST",
                serde_json::json!({ "username": "maria", "password": "secret" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_month_then_dashboard_shows_summary() {
        let (app, _dir) = test_app();
        let token = register(&app, "maria").await;

        let response = app
            .clone()
            .oneshot(authed_request(
                "/expenses/fixed",
                "POST",
                &token,
                Some(serde_json::json!({ "description": "Rent", "amount": "300" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(authed_request(
                "/months",
                "POST",
                &token,
                Some(serde_json::json!({ "name": "january", "income": "1000" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(authed_request(
                "/expenses/variable",
                "POST",
                &token,
                Some(serde_json::json!({
                    "description": "Groceries", "amount": "50", "day": "05", "month": "01"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(authed_request("/dashboard", "GET", &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["current_month"], "january");
        assert_eq!(body["summary"]["total_fixed"], "300");
        assert_eq!(body["summary"]["total_variable"], "50");
        assert_eq!(body["summary"]["balance"], "650");
        assert_eq!(body["expenses"][0]["descripcion"], "Groceries");
    }

    #[tokio::test]
    async fn switch_to_unknown_month_is_a_bad_request() {
        let (app, _dir) = test_app();
        let token = register(&app, "maria").await;

        let response = app
            .oneshot(authed_request(
                "/months/current",
                "POST",
                &token,
                Some(serde_json::json!({ "name": "ghost" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn non_positive_amount_is_a_bad_request() {
        let (app, _dir) = test_app();
        let token = register(&app, "maria").await;

        let response = app
            .oneshot(authed_request(
                "/expenses/fixed",
                "POST",
                &token,
                Some(serde_json::json!({ "description": "Rent", "amount": "0" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn export_without_a_month_fails_and_with_one_is_an_attachment() {
        let (app, _dir) = test_app();
        let token = register(&app, "maria").await;

        let response = app
            .clone()
            .oneshot(authed_request("/export/csv", "GET", &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(authed_request(
                "/months",
                "POST",
                &token,
                Some(serde_json::json!({ "name": "january", "income": "1000" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(authed_request("/export/csv", "GET", &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(disposition, "attachment; filename=\"january.csv\"");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let csv = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(csv.starts_with("Fecha,Concepto,Importe,Tipo"));
    }

    #[tokio::test]
    async fn remove_variable_expense_out_of_range_reports_failure() {
        let (app, _dir) = test_app();
        let token = register(&app, "maria").await;

        let response = app
            .clone()
            .oneshot(authed_request(
                "/months",
                "POST",
                &token,
                Some(serde_json::json!({ "name": "january", "income": "1000" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(authed_request("/expenses/variable/7", "DELETE", &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("does not exist"));
    }
}
