//! Storage for uploaded excuse documents.

use std::path::{Path, PathBuf};

use chrono::Utc;
use util::config;

pub const MAX_EXCUSE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

#[derive(Debug)]
pub enum ExcuseStoreError {
    UnsupportedType,
    TooLarge,
    Io(std::io::Error),
}

impl std::fmt::Display for ExcuseStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedType => write!(f, "only PDF, JPG and PNG files are accepted"),
            Self::TooLarge => write!(f, "file exceeds the 5 MB limit"),
            Self::Io(e) => write!(f, "failed to store file: {e}"),
        }
    }
}

impl std::error::Error for ExcuseStoreError {}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Directory all excuse documents land in.
pub fn excuses_dir() -> PathBuf {
    PathBuf::from(config::storage_root()).join("excuses")
}

/// Validates and persists an uploaded excuse document.
///
/// Returns the stored filename (not the full path), which is what gets
/// recorded on the attendance row.
pub async fn store_excuse_file(
    session_id: i64,
    student_id: &str,
    original_filename: &str,
    bytes: &[u8],
) -> Result<String, ExcuseStoreError> {
    let ext = extension_of(original_filename)
        .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
        .ok_or(ExcuseStoreError::UnsupportedType)?;
    if bytes.len() > MAX_EXCUSE_BYTES {
        return Err(ExcuseStoreError::TooLarge);
    }

    // The student id goes into a filename; keep only harmless characters.
    let safe_student: String = student_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let filename = format!(
        "excuse_{}_{}_{}.{}",
        session_id,
        safe_student,
        Utc::now().timestamp_millis(),
        ext
    );

    let dir = excuses_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(ExcuseStoreError::Io)?;
    tokio::fs::write(dir.join(&filename), bytes)
        .await
        .map_err(ExcuseStoreError::Io)?;

    Ok(filename)
}
