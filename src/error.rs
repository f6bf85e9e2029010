use std::path::PathBuf;

/// Errors raised while loading or validating configuration.
///
/// Issuing ids never fails; only the configuration path does.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The manifest file could not be read.
    #[error("reading manifest {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid YAML or does not match the expected shape.
    #[error("parsing manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The civil date does not fit in the supported calendar range.
    #[error("epoch {year}-{month}-{day} is out of range")]
    EpochOutOfRange { year: i32, month: i32, day: i32 },

    /// An id kind was declared without a name.
    #[error("id kind #{index} has an empty name")]
    EmptyKindName { index: usize },

    /// Two id kinds share a name.
    #[error("id kind {0:?} is declared more than once")]
    DuplicateKind(String),
}

/// Result alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;
