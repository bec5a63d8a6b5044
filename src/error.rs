use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy of the version store.
///
/// Every failure is returned to the caller with enough context (offending
/// path, digest or catalog entry) to diagnose it; no operation retries
/// automatically.
#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(verstore::io_error))]
    Io(#[from] std::io::Error),

    #[error("I/O error: {message}{}", path_suffix(.path))]
    #[diagnostic(code(verstore::io_error_detailed))]
    IoDetailed {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("database error: {context}")]
    #[diagnostic(
        code(verstore::database_error),
        help("Check that the index file is accessible and not corrupted")
    )]
    Database {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store is not open")]
    #[diagnostic(
        code(verstore::not_open),
        help("Call open() before using the store")
    )]
    NotOpen,

    #[error("not found: {0}")]
    #[diagnostic(code(verstore::not_found))]
    NotFound(String),

    #[error("catalog entry contains invalid date: {0:?}")]
    #[diagnostic(
        code(verstore::invalid_date),
        help("The index may be corrupted; the stored timestamp does not decode")
    )]
    InvalidDate(String),

    #[error("directory cannot be created because {0} is a file")]
    #[diagnostic(code(verstore::directory_conflict))]
    DirectoryConflict(PathBuf),
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" ({})", p.display()),
        None => String::new(),
    }
}

impl StoreError {
    pub fn io_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        StoreError::IoDetailed {
            message: message.into(),
            path,
        }
    }

    pub fn database(context: impl Into<String>, source: rusqlite::Error) -> Self {
        StoreError::Database {
            context: context.into(),
            source,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        StoreError::NotFound(message.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
