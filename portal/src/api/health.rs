//! ヘルスチェックAPIハンドラー

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

/// ヘルスチェックレスポンス
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` / `degraded`
    pub status: &'static str,
    /// バージョン
    pub version: &'static str,
    /// データベース疎通
    pub database: bool,
}

/// GET /health - 稼働確認
///
/// データベースに到達できない場合は `503` を返す。
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match sqlx::query("SELECT 1").execute(&state.db_pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Health check database probe failed: {}", e);
            false
        }
    };

    let (status, label) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            version: env!("CARGO_PKG_VERSION"),
            database,
        }),
    )
}
