/// Crate-wide result alias.
pub type TempraResult<T> = Result<T, TempraError>;

/// Crate-wide error type.
#[derive(thiserror::Error, Debug)]
pub enum TempraError {
    /// Descriptor or handle validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// Timing-engine contract violation (seek, speed, projection inputs).
    #[error("timing error: {0}")]
    Timing(String),

    /// Animation value contract violation.
    #[error("animation error: {0}")]
    Animation(String),

    /// Composition-layer misuse.
    #[error("composition error: {0}")]
    Composition(String),

    /// Any other error, preserved with its source chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TempraError {
    /// Build a [`TempraError::Validation`] from a message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TempraError::Timing`] from a message.
    pub fn timing(msg: impl Into<String>) -> Self {
        Self::Timing(msg.into())
    }

    /// Build a [`TempraError::Animation`] from a message.
    pub fn animation(msg: impl Into<String>) -> Self {
        Self::Animation(msg.into())
    }

    /// Build a [`TempraError::Composition`] from a message.
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }
}
