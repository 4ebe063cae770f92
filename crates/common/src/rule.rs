use crate::signature::SignaturePattern;
use crate::Source;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::fmt;

/// Visibility class of a restricted API.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Archive,
    Deserialize,
    Serialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Visibility {
    /// `@hide` platform API.
    Hidden,
    /// `@VisibleForTesting` / test-only API.
    TestOnly,
    /// Accessible only to apps targeting at most `max_target_api`.
    Conditional {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_target_api: Option<u32>,
    },
}

/// Kind-specific data carried by a rule record.
///
/// Serialized (JSON) with an inline `kind` tag, e.g.
/// `{"kind": "min_api_level", "level": 21}`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Archive,
    Deserialize,
    Serialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RulePayload {
    Deprecated {
        /// Replacement signature hint.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replacement: Option<String>,
    },
    Removed {
        /// API level of removal, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        since: Option<u32>,
    },
    RestrictedVisibility {
        visibility: Visibility,
    },
    MinApiLevel {
        level: u32,
    },
    MaxApiLevel {
        level: u32,
    },
    SinceVersion {
        version: String,
    },
}

impl RulePayload {
    pub fn kind(&self) -> RuleKind {
        match self {
            RulePayload::Deprecated { .. } => RuleKind::Deprecated,
            RulePayload::Removed { .. } => RuleKind::Removed,
            RulePayload::RestrictedVisibility { .. } => RuleKind::RestrictedVisibility,
            RulePayload::MinApiLevel { .. } => RuleKind::MinApiLevel,
            RulePayload::MaxApiLevel { .. } => RuleKind::MaxApiLevel,
            RulePayload::SinceVersion { .. } => RuleKind::SinceVersion,
        }
    }
}

impl fmt::Display for RulePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePayload::Deprecated { replacement: None } => f.write_str("deprecated"),
            RulePayload::Deprecated {
                replacement: Some(hint),
            } => write!(f, "deprecated, use {hint} instead"),
            RulePayload::Removed { since: None } => f.write_str("removed"),
            RulePayload::Removed { since: Some(level) } => {
                write!(f, "removed in API level {level}")
            }
            RulePayload::RestrictedVisibility { visibility } => match visibility {
                Visibility::Hidden => f.write_str("restricted: hidden API (@hide)"),
                Visibility::TestOnly => f.write_str("restricted: test-only API"),
                Visibility::Conditional {
                    max_target_api: None,
                } => f.write_str("restricted: conditionally accessible"),
                Visibility::Conditional {
                    max_target_api: Some(level),
                } => write!(f, "restricted: accessible up to target API level {level}"),
            },
            RulePayload::MinApiLevel { level } => write!(f, "requires API level {level}"),
            RulePayload::MaxApiLevel { level } => {
                write!(f, "not available above API level {level}")
            }
            RulePayload::SinceVersion { version } => write!(f, "added in {version}"),
        }
    }
}

/// Rule kind, declared in reporting severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, SerdeSerialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Removed,
    RestrictedVisibility,
    MinApiLevel,
    MaxApiLevel,
    Deprecated,
    SinceVersion,
}

impl RuleKind {
    pub const ALL: [RuleKind; 6] = [
        RuleKind::Removed,
        RuleKind::RestrictedVisibility,
        RuleKind::MinApiLevel,
        RuleKind::MaxApiLevel,
        RuleKind::Deprecated,
        RuleKind::SinceVersion,
    ];

    /// Severity tier; lower is more severe. API level bounds share a tier.
    pub fn severity(self) -> u8 {
        match self {
            RuleKind::Removed => 0,
            RuleKind::RestrictedVisibility => 1,
            RuleKind::MinApiLevel | RuleKind::MaxApiLevel => 2,
            RuleKind::Deprecated => 3,
            RuleKind::SinceVersion => 4,
        }
    }

    /// Absolute kinds end the owner ancestry walk.
    pub fn is_absolute(self) -> bool {
        matches!(self, RuleKind::Removed | RuleKind::RestrictedVisibility)
    }

    pub fn is_api_bound(self) -> bool {
        matches!(self, RuleKind::MinApiLevel | RuleKind::MaxApiLevel)
    }

    pub fn flag(self) -> KindSet {
        match self {
            RuleKind::Removed => KindSet::REMOVED,
            RuleKind::RestrictedVisibility => KindSet::RESTRICTED,
            RuleKind::MinApiLevel => KindSet::MIN_API,
            RuleKind::MaxApiLevel => KindSet::MAX_API,
            RuleKind::Deprecated => KindSet::DEPRECATED,
            RuleKind::SinceVersion => KindSet::SINCE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::Removed => "removed",
            RuleKind::RestrictedVisibility => "restricted_visibility",
            RuleKind::MinApiLevel => "min_api_level",
            RuleKind::MaxApiLevel => "max_api_level",
            RuleKind::Deprecated => "deprecated",
            RuleKind::SinceVersion => "since_version",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags::bitflags! {
    /// Set of rule kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KindSet: u8 {
        const REMOVED = 1;
        const RESTRICTED = 1 << 1;
        const MIN_API = 1 << 2;
        const MAX_API = 1 << 3;
        const DEPRECATED = 1 << 4;
        const SINCE = 1 << 5;
    }
}

impl KindSet {
    pub fn has(self, kind: RuleKind) -> bool {
        self.contains(kind.flag())
    }
}

/// One fact about a signature pattern plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    pub pattern: SignaturePattern,
    pub payload: RulePayload,
    pub source: Source,
    /// Maven coordinate (`group:artifact`) that contributed the record.
    pub artifact: Option<String>,
}

impl RuleRecord {
    pub fn kind(&self) -> RuleKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_json_shape() {
        let payload: RulePayload =
            serde_json::from_str(r#"{"kind": "deprecated", "replacement": "clearCache2"}"#).unwrap();
        assert_eq!(
            payload,
            RulePayload::Deprecated {
                replacement: Some("clearCache2".into())
            }
        );

        let restricted: RulePayload = serde_json::from_str(
            r#"{"kind": "restricted_visibility", "visibility": {"type": "conditional", "max_target_api": 28}}"#,
        )
        .unwrap();
        assert_eq!(restricted.kind(), RuleKind::RestrictedVisibility);

        let bare: RulePayload = serde_json::from_str(r#"{"kind": "removed"}"#).unwrap();
        assert_eq!(bare, RulePayload::Removed { since: None });
    }

    #[test]
    fn test_severity_order() {
        assert!(RuleKind::Removed.severity() < RuleKind::RestrictedVisibility.severity());
        assert_eq!(
            RuleKind::MinApiLevel.severity(),
            RuleKind::MaxApiLevel.severity()
        );
        assert!(RuleKind::Deprecated.severity() < RuleKind::SinceVersion.severity());
    }

    #[test]
    fn test_kind_set() {
        let mut set = KindSet::empty();
        set |= RuleKind::Deprecated.flag();
        assert!(set.has(RuleKind::Deprecated));
        assert!(!set.has(RuleKind::Removed));
    }

    #[test]
    fn test_payload_messages() {
        let hint = RulePayload::Deprecated {
            replacement: Some("b.C#d()".into()),
        };
        assert_eq!(hint.to_string(), "deprecated, use b.C#d() instead");
        assert_eq!(
            RulePayload::MinApiLevel { level: 21 }.to_string(),
            "requires API level 21"
        );
    }
}
