use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (inverted thresholds, out-of-range values).
    ConfigValidation(String),
    /// A stage's required input is absent (upstream produced nothing).
    MissingInput(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingInput(msg) => write!(f, "missing input: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
