/// Core error type for the tally system.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("division by zero is not allowed")]
    DivisionByZero,

    #[error("amount cannot be negative: {0}")]
    NegativeAmount(f64),

    #[error("invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("exchange rate service error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is the caller's fault (bad input) rather than
    /// a failure of the system or an upstream dependency. Validation
    /// errors are never retried and map to a client-error response class.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperation(_)
                | Self::DivisionByZero
                | Self::NegativeAmount(_)
                | Self::InvalidCurrency(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_classification() {
        assert!(Error::UnsupportedOperation("modulo".into()).is_validation());
        assert!(Error::DivisionByZero.is_validation());
        assert!(Error::NegativeAmount(-1.0).is_validation());
        assert!(Error::InvalidCurrency("".into()).is_validation());
        assert!(!Error::Network("timeout".into()).is_validation());
        assert!(!Error::Upstream("unsupported-code".into()).is_validation());
    }
}
