use thiserror::Error;

#[derive(Error, Debug)]
pub enum CurationError {
    // a single malformed source record, the caller skips it
    #[error("failed to parse {source_name}: {reason}")]
    Parse {
        source_name: String,
        reason: String,
    },

    // a remote identifier or annotation query that failed or had no match
    #[error("lookup of {id} failed: {reason}")]
    Lookup {
        id: String,
        reason: String,
    },

    #[error("{0}")]
    Fatal(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        source: csv::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

impl CurationError {
    pub fn parse(source_name: &str, reason: impl ToString) -> CurationError {
        CurationError::Parse {
            source_name: source_name.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub fn lookup(id: &str, reason: impl ToString) -> CurationError {
        CurationError::Lookup {
            id: id.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> CurationError {
        CurationError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn csv(path: impl AsRef<std::path::Path>, source: csv::Error) -> CurationError {
        CurationError::Csv {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn json(path: impl AsRef<std::path::Path>, source: serde_json::Error) -> CurationError {
        CurationError::Json {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    // errors that must halt the whole run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CurationError::Parse { .. } | CurationError::Lookup { .. })
    }
}

pub type Result<T> = std::result::Result<T, CurationError>;
