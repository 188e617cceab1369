use crate::error::Error;

/// Result type alias used throughout kvcol.
pub type Result<T> = std::result::Result<T, Error>;
