pub type CloudResult<T> = Result<T, CloudError>;

#[derive(thiserror::Error, Debug)]
pub enum CloudError {
    /// A source raster was missing, truncated, undecodable or of the wrong size.
    #[error("acquisition error: {0}")]
    Acquisition(String),

    /// Inputs handed to a stage disagree with each other or with the working geometry.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// Resampling, encoding or publishing a single output file failed.
    #[error("encode error: {0}")]
    Encode(String),

    #[error("gpu error: {0}")]
    Gpu(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CloudError {
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors that abort a run before anything is written.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            Self::Acquisition(_) | Self::Precondition(_) | Self::Gpu(_) | Self::Config(_)
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
