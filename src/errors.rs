use thiserror::Error;

/// Top-level error for the scan orchestration path.
///
/// Nothing below the `scan()` boundary escapes as an unhandled error: engine
/// and I/O failures are caught there, logged, and converted into a cleared
/// per-file state. `ScanError` values therefore mostly travel through logs,
/// not through caller-visible `Result`s.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Engine invocation error: {0}")]
    Engine(#[from] EngineError),
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ScanError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Failures of an external detection engine. Distinguishable from "zero
/// findings", which is a successful empty result.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine invocation failed: {0}")]
    Invocation(String),
    #[error("Engine returned malformed output: {0}")]
    MalformedOutput(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Required configuration field '{0}' is missing or invalid")]
    FieldMissing(String),
    #[error("Unknown scanner '{0}'")]
    UnknownScanner(String),
}
