//! Session secret management
//!
//! Provides automatic generation and file-based persistence of the session
//! signing secret. The secret is stored in `<data dir>/session_secret` with
//! permissions 600.

use crate::config::{data_dir, get_env_with_fallback};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// Session secret file name
const SESSION_SECRET_FILE: &str = "session_secret";

/// Get or create the session secret
///
/// Priority:
/// 1. Environment variable `PORTAL_SESSION_SECRET` (or deprecated `JWT_SECRET`)
/// 2. Read from file `<data dir>/session_secret`
/// 3. Generate a new random secret and save it to that file
///
/// # Returns
/// * `Ok(secret)` - The session secret string
/// * `Err(io::Error)` - Failed to read/write secret file
pub fn get_or_create_session_secret() -> io::Result<String> {
    if let Some(secret) = get_env_with_fallback("PORTAL_SESSION_SECRET", "JWT_SECRET") {
        if !secret.is_empty() {
            tracing::info!("Using session secret from environment variable");
            return Ok(secret);
        }
    }

    let secret_path = session_secret_path()?;
    load_or_create(&secret_path)
}

fn load_or_create(secret_path: &Path) -> io::Result<String> {
    match fs::read_to_string(secret_path) {
        Ok(stored) if !stored.trim().is_empty() => {
            tracing::info!("Using session secret from file: {}", secret_path.display());
            return Ok(stored.trim().to_string());
        }
        Ok(_) => tracing::warn!("Session secret file is empty, regenerating"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let secret = random_secret();
    persist_secret(secret_path, &secret)?;
    tracing::info!("Generated session secret at {}", secret_path.display());
    Ok(secret)
}

fn session_secret_path() -> io::Result<PathBuf> {
    data_dir()
        .map(|dir| dir.join(SESSION_SECRET_FILE))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Failed to resolve home directory"))
}

/// Two UUIDv4s (244 random bits)
fn random_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Owner-only on unix; the mode is applied at creation and re-applied for existing files.
fn persist_secret(path: &Path, secret: &str) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path)?;
    file.write_all(secret.as_bytes())?;

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
