use crate::app::redis_client::{KeyStore, StoreError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;

const MAX_NAME_LEN: usize = 50;
const FALLBACK_EDITOR: &str = "vi";

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("failed to create temp file: {0}")]
    TempFile(#[source] io::Error),
    #[error("failed to write to temp file: {0}")]
    Write(#[source] io::Error),
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("editor exited with {0}")]
    Exit(ExitStatus),
    #[error("no editor configured")]
    NoEditor,
    #[error("failed to read temp file: {0}")]
    Read(#[source] io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Replaces characters that are awkward in file names and caps the length.
pub fn sanitize_filename(key: &str) -> String {
    key.chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .take(MAX_NAME_LEN)
        .collect()
}

/// Editor command line: configured value, then `$EDITOR`, then `vi`.
pub fn resolve_editor(configured: Option<&str>) -> Vec<String> {
    let from_env = std::env::var("EDITOR").ok();
    let raw = configured
        .filter(|cmd| !cmd.trim().is_empty())
        .map(str::to_string)
        .or_else(|| from_env.filter(|cmd| !cmd.trim().is_empty()))
        .unwrap_or_else(|| FALLBACK_EDITOR.to_string());
    raw.split_whitespace().map(str::to_string).collect()
}

/// Writes `content` to a fresh temp file that survives until `apply_edit`
/// or `discard` removes it.
pub fn prepare_file(key: &str, content: &str, create: bool) -> Result<PathBuf, EditorError> {
    let prefix = if create {
        format!("keyglass-new-{}-", sanitize_filename(key))
    } else {
        format!("keyglass-{}-", sanitize_filename(key))
    };
    let mut file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".txt")
        .tempfile()
        .map_err(EditorError::TempFile)?;
    file.write_all(content.as_bytes())
        .and_then(|_| file.flush())
        .map_err(EditorError::Write)?;
    file.into_temp_path()
        .keep()
        .map_err(|e| EditorError::TempFile(e.error))
}

pub async fn run_editor(command: &[String], path: &Path) -> Result<(), EditorError> {
    let (program, args) = command.split_first().ok_or(EditorError::NoEditor)?;
    log::info!("Launching editor '{}' on {}", program, path.display());
    let status = tokio::process::Command::new(program)
        .args(args)
        .arg(path)
        .status()
        .await
        .map_err(|source| EditorError::Launch {
            program: program.clone(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(EditorError::Exit(status))
    }
}

/// Stores the edited buffer verbatim as the key's string value. The temp
/// file is removed whatever happens.
pub async fn apply_edit(store: &dyn KeyStore, key: &str, path: &Path) -> Result<(), EditorError> {
    let _cleanup = TempFileGuard(path.to_path_buf());
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(EditorError::Read)?;
    store.set_string(key, &content).await?;
    Ok(())
}

pub fn discard(path: &Path) {
    drop(TempFileGuard(path.to_path_buf()));
}

struct TempFileGuard(PathBuf);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Could not remove temp file {}: {}", self.0.display(), e);
            }
        }
    }
}
