//! REST APIハンドラー
//!
//! 全ルートにセッションゲートを適用する。ハンドラーはゲートが差し込んだ `AuthContext` を受け取る。

pub mod auth;
pub mod contact;
pub mod contacts;
pub mod dashboard;
pub mod health;
pub mod portal;
pub mod tickets;
pub mod users;

use crate::AppState;
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use fritz_portal_common::error::PortalError;
use serde_json::json;
use tower_http::trace::TraceLayer;

/// APIルーターを作成
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/contact", post(contact::submit_contact))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .route(
            "/forgot-password",
            get(auth::forgot_password_page).post(auth::forgot_password),
        )
        .route(
            "/reset-password",
            get(auth::reset_password_page).post(auth::reset_password),
        );

    let portal_routes = Router::new()
        .route("/portal", get(portal::overview))
        .route(
            "/portal/tickets",
            get(tickets::list_own_tickets).post(tickets::create_ticket),
        )
        .route("/portal/tickets/:id", get(tickets::get_own_ticket))
        .route(
            "/portal/tickets/:id/messages",
            post(tickets::post_own_message),
        )
        .route("/portal/files", get(portal::list_files))
        .route(
            "/portal/settings",
            get(portal::get_settings).put(portal::update_settings),
        );

    let admin_routes = Router::new()
        .route("/admin", get(dashboard::get_stats))
        .route("/admin/tickets", get(tickets::list_all_tickets))
        .route(
            "/admin/tickets/:id",
            get(tickets::get_any_ticket).put(tickets::update_ticket),
        )
        .route("/admin/tickets/:id/reopen", post(tickets::reopen_ticket))
        .route(
            "/admin/tickets/:id/messages",
            post(tickets::post_staff_message),
        )
        .route("/admin/users", get(users::list_users))
        .route(
            "/admin/users/:id",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/admin/users/:id/role", put(users::update_role))
        .route("/admin/contacts", get(contacts::list_contacts))
        .route(
            "/admin/contacts/:id",
            get(contacts::get_contact).put(contacts::update_contact),
        );

    Router::new()
        .merge(public_routes)
        .merge(portal_routes)
        .merge(admin_routes)
        // 未定義パスにもゲートを通すため、layerより前に登録する
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::middleware::session_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> Response {
    AppError(PortalError::NotFound("Route not found".to_string())).into_response()
}

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub PortalError);

impl From<PortalError> for AppError {
    fn from(err: PortalError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            PortalError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            PortalError::Validation(_) | PortalError::InvalidTransition { .. } => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            PortalError::Conflict(_) => (StatusCode::CONFLICT, self.0.to_string()),
            PortalError::Authentication(_) => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            PortalError::Authorization(_) => (StatusCode::FORBIDDEN, self.0.to_string()),
            other => {
                tracing::error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
