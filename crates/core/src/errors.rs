use thiserror::Error;

/// User input failed a format or membership check. Always recoverable: the
/// engine re-prompts and leaves the conversation untouched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("date `{0}` does not match D/M/YYYY")]
    DateFormat(String),
    #[error("date `{0}` is not a real calendar date")]
    DateNotReal(String),
    #[error("date `{0}` is in the past")]
    DatePast(String),
    #[error("time `{0}` does not match HH:MM")]
    TimeFormat(String),
}

/// The Q&A/intent backend failed at the transport or shape level. Recoverable:
/// the engine surfaces a retry message and performs no state transition.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Request(String),
    #[error("classifier returned an unusable response: {0}")]
    Shape(String),
}

/// A dynamic service or slot catalog was missing or unparsable. Fatal to the
/// current conversation: booking cannot proceed without a trustworthy catalog.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog fetch failed: {0}")]
    Fetch(String),
    #[error("no structured payload found in catalog response")]
    NotFound,
    #[error("catalog payload is malformed: {0}")]
    Malformed(String),
    #[error("catalog payload is empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::{CatalogError, ValidationError};

    #[test]
    fn errors_render_operator_context() {
        let error = ValidationError::DateFormat("mañana".to_owned());
        assert!(error.to_string().contains("mañana"));

        let error = CatalogError::Malformed("unexpected token".to_owned());
        assert!(error.to_string().contains("unexpected token"));
    }
}
