use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::BoardConfig;

/// Config file marking a board directory
pub const CONFIG_FILE: &str = "taskboard.toml";

/// Error type for board directory I/O
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("not a task board: no taskboard.toml found")]
    NotABoard,
    #[error("a task board already exists in {0}")]
    AlreadyExists(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse taskboard.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Find the board directory by walking up from `start`, looking for
/// `taskboard.toml`.
pub fn discover_board(start: &Path) -> Result<PathBuf, BoardError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(BoardError::NotABoard);
        }
    }
}

/// Read `taskboard.toml`. A missing file means all defaults.
pub fn read_config(root: &Path) -> Result<BoardConfig, BoardError> {
    let path = root.join(CONFIG_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BoardConfig::default()),
        Err(e) => return Err(BoardError::ReadError { path, source: e }),
    };
    Ok(toml::from_str(&text)?)
}
