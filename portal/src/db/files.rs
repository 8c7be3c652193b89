//! ファイルメタデータ操作（アップロード本体は扱わない）

use super::{format_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid};
use fritz_portal_common::error::{PortalError, PortalResult};
use fritz_portal_common::types::PortalFile;
use sqlx::SqlitePool;
use uuid::Uuid;

/// ファイルメタデータを登録
pub async fn create(
    pool: &SqlitePool,
    uploaded_by: Uuid,
    ticket_id: Option<Uuid>,
    original_filename: &str,
    storage_path: &str,
    file_size: Option<i64>,
    mime_type: Option<&str>,
) -> PortalResult<PortalFile> {
    let id = Uuid::new_v4();
    let file = PortalFile {
        id,
        uploaded_by,
        ticket_id,
        filename: format!("{}-{}", id, original_filename),
        original_filename: original_filename.to_string(),
        storage_path: storage_path.to_string(),
        file_size,
        mime_type: mime_type.map(str::to_string),
        created_at: super::now(),
    };

    sqlx::query(
        "INSERT INTO files (id, uploaded_by, ticket_id, filename, original_filename, storage_path, file_size, mime_type, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(file.id.to_string())
    .bind(uploaded_by.to_string())
    .bind(ticket_id.map(|t| t.to_string()))
    .bind(&file.filename)
    .bind(&file.original_filename)
    .bind(&file.storage_path)
    .bind(file.file_size)
    .bind(&file.mime_type)
    .bind(format_timestamp(file.created_at))
    .execute(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to register file: {}", e)))?;

    Ok(file)
}

/// 指定ユーザーのファイル一覧（新しい順）
pub async fn list_for_uploader(pool: &SqlitePool, uploaded_by: Uuid) -> PortalResult<Vec<PortalFile>> {
    let rows = sqlx::query_as::<_, FileRow>(
        "SELECT id, uploaded_by, ticket_id, filename, original_filename, storage_path, file_size, mime_type, created_at
         FROM files
         WHERE uploaded_by = ?
         ORDER BY created_at DESC, rowid DESC",
    )
    .bind(uploaded_by.to_string())
    .fetch_all(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to list files: {}", e)))?;

    rows.into_iter().map(FileRow::into_file).collect()
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: String,
    uploaded_by: String,
    ticket_id: Option<String>,
    filename: String,
    original_filename: String,
    storage_path: String,
    file_size: Option<i64>,
    mime_type: Option<String>,
    created_at: String,
}

impl FileRow {
    fn into_file(self) -> PortalResult<PortalFile> {
        Ok(PortalFile {
            id: parse_uuid(&self.id)?,
            uploaded_by: parse_uuid(&self.uploaded_by)?,
            ticket_id: parse_optional_uuid(self.ticket_id)?,
            filename: self.filename,
            original_filename: self.original_filename,
            storage_path: self.storage_path,
            file_size: self.file_size,
            mime_type: self.mime_type,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
