use common::{RuleKind, RulePayload, RuleRecord, Source};
use serde::Serialize as SerdeSerialize;
use std::fmt;

/// How a finding's record matched the queried signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, SerdeSerialize)]
#[serde(tag = "match", content = "prefix", rename_all = "snake_case")]
pub enum MatchScope {
    Exact,
    /// Matched through the owner prefix pattern `prefix.*`.
    OwnerPrefix(String),
}

/// One reportable fact about a queried signature.
#[derive(Debug, Clone, PartialEq, Eq, SerdeSerialize)]
pub struct Finding {
    #[serde(flatten)]
    pub payload: RulePayload,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    pub scope: MatchScope,
}

impl Finding {
    pub(crate) fn from_record(record: &RuleRecord, scope: MatchScope) -> Self {
        Self {
            payload: record.payload.clone(),
            source: record.source,
            artifact: record.artifact.clone(),
            scope,
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.payload.kind()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({}", self.kind(), self.payload, self.source)?;
        if let Some(artifact) = &self.artifact {
            write!(f, ", {artifact}")?;
        }
        f.write_str(")")?;
        if let MatchScope::OwnerPrefix(prefix) = &self.scope {
            write!(f, " via {prefix}.*")?;
        }
        Ok(())
    }
}
