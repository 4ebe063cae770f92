use common::SignatureError;

/// Per-query errors. Never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),
    #[error("invalid API level {0} (must be at least 1)")]
    InvalidApiLevel(i32),
    #[error("`{0}` is not a method signature")]
    NotAMethod(String),
}

/// Call-site context of a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryContext {
    /// Effective API level of the call site, if known.
    pub api_level: Option<i32>,
    /// Report API level bounds even when the call site level is unknown.
    pub strict: bool,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_api_level(level: i32) -> Self {
        Self {
            api_level: Some(level),
            strict: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Checks the context and returns the API level as an unsigned value.
    pub fn validate(&self) -> Result<Option<u32>, QueryError> {
        match self.api_level {
            None => Ok(None),
            Some(level) if level < 1 => Err(QueryError::InvalidApiLevel(level)),
            Some(level) => Ok(Some(level.unsigned_abs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert_eq!(QueryContext::new().validate(), Ok(None));
        assert_eq!(QueryContext::at_api_level(30).validate(), Ok(Some(30)));
        assert_eq!(
            QueryContext::at_api_level(0).validate(),
            Err(QueryError::InvalidApiLevel(0))
        );
        assert_eq!(
            QueryContext::at_api_level(-5).strict(true).validate(),
            Err(QueryError::InvalidApiLevel(-5))
        );
    }
}
