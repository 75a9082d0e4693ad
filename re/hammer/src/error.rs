use prjsense_types::StoreError;

pub type DerivationError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can abort a job. Each of these is fatal for the job that
/// raised it and for that job only.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("resolution error: net {net} addresses no bit in {scope}")]
    Resolution { net: String, scope: String },
    #[error("derivation failed for {target}: {source}")]
    Derivation {
        target: String,
        #[source]
        source: DerivationError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::Resolution { .. } => "ResolutionError",
            Error::Derivation { .. } => "DerivationError",
            Error::Store(_) => "StoreError",
        }
    }
}
