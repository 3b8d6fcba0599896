use thiserror::Error;

/// Library-boundary failures. Expected absence of data is never an error
/// anywhere in the engine; only real IO problems at the host seam land
/// here.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("project root {0} is not a directory")]
    NotADirectory(String),
}
