use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Grid must hold an even number of cards, got {0}")]
    OddCardCount(u32),
    #[error("Grid must have at least one row and one column")]
    EmptyGrid,
    #[error("A round needs at least one pair")]
    NoPairs,
    #[error("Shape pool is empty")]
    EmptyShapePool,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = core::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Stored value for {key} is not {expected}")]
    WrongType { key: String, expected: &'static str },
}

pub type StorageResult<T> = core::result::Result<T, StorageError>;
