//! ロギング初期化
//!
//! `tracing` で標準出力（人間向け）と日次ローテーションのJSON Linesファイルへ出力する。
//! ファイル名は `fritz-portal.jsonl.YYYY-MM-DD`（UTC日付）。保持日数を過ぎたファイルは初期化時に削除する。

use crate::config::data_dir;
use chrono::Utc;
use std::{
    env, fs,
    io::{self, Error, ErrorKind},
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログファイルベース名（JSON Lines）
pub const LOG_FILE_BASE: &str = "fritz-portal.jsonl";

const LOG_SUBDIR: &str = "logs";
const DEFAULT_RETENTION_DAYS: u32 = 7;

const LOG_DIR_ENV: &str = "PORTAL_LOG_DIR";
const LOG_LEVEL_ENV: &str = "PORTAL_LOG_LEVEL";
const LOG_RETENTION_DAYS_ENV: &str = "PORTAL_LOG_RETENTION_DAYS";
const ALT_LEVEL_ENV: &str = "RUST_LOG";

static LOGGER_GUARD: OnceLock<Result<LoggerGuard, io::Error>> = OnceLock::new();

struct LoggerGuard {
    _file_guard: WorkerGuard,
}

/// ログ出力を初期化する（2回目以降は最初の結果を返す）
pub fn init() -> io::Result<()> {
    match LOGGER_GUARD.get_or_init(configure_logger) {
        Ok(_) => Ok(()),
        Err(err) => Err(io::Error::new(err.kind(), err.to_string())),
    }
}

/// ログディレクトリ
///
/// `PORTAL_LOG_DIR`、なければデータディレクトリ配下の `logs`。
pub fn log_dir() -> io::Result<PathBuf> {
    if let Ok(dir) = env::var(LOG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    data_dir()
        .map(|dir| dir.join(LOG_SUBDIR))
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "Failed to resolve home directory"))
}

fn today_suffix() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// 現在書き込み中のログファイルのパス
pub fn log_file_path() -> io::Result<PathBuf> {
    Ok(log_dir()?.join(format!("{}.{}", LOG_FILE_BASE, today_suffix())))
}

fn retention_days() -> u32 {
    env::var(LOG_RETENTION_DAYS_ENV)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_RETENTION_DAYS)
}

/// 保持日数を過ぎたログファイルを削除
fn cleanup_old_logs(log_dir: &Path, retention_days: u32) -> io::Result<()> {
    if !log_dir.exists() {
        return Ok(());
    }

    let cutoff = (Utc::now() - chrono::Duration::days(i64::from(retention_days))).date_naive();
    let prefix = format!("{}.", LOG_FILE_BASE);

    let expired = fs::read_dir(log_dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(&prefix))
                .and_then(|date| chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
                .is_some_and(|date| date < cutoff)
        });
    for path in expired {
        if let Err(e) = fs::remove_file(&path) {
            eprintln!("failed to remove old log {}: {}", path.display(), e);
        }
    }
    Ok(())
}

fn configure_logger() -> io::Result<LoggerGuard> {
    let log_directory = log_dir()?;
    fs::create_dir_all(&log_directory)?;
    cleanup_old_logs(&log_directory, retention_days())?;

    let (file_writer, file_guard) = non_blocking(rolling::daily(&log_directory, LOG_FILE_BASE));

    // PORTAL_LOG_LEVEL > RUST_LOG > info
    let env_filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_from_env(ALT_LEVEL_ENV))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_writer(file_writer)
        .with_ansi(false);
    let console_layer = fmt::layer().compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(console_layer)
        .try_init()
        .map_err(Error::other)?;

    tracing::info!(
        log_dir = %log_directory.display(),
        retention_days = retention_days(),
        "Logging initialized"
    );

    Ok(LoggerGuard {
        _file_guard: file_guard,
    })
}
