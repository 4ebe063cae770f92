//! Extractor output: one partial dataset per JSON file.

use common::typedef::TypedefKind;
use common::{RulePayload, Source};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::MergeError;

/// Rules harvested from one source.
#[derive(Debug, Clone, PartialEq, Eq, SerdeSerialize, SerdeDeserialize)]
pub struct PartialDataset {
    pub source: Source,
    /// Default provenance for records that do not name their own artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub typedefs: Vec<RawTypedef>,
    /// Qualified constant name to literal text.
    #[serde(default)]
    pub constants: BTreeMap<String, String>,
}

/// Record as written by an extractor. The pattern is still unparsed text.
#[derive(Debug, Clone, PartialEq, Eq, SerdeSerialize, SerdeDeserialize)]
pub struct RawRecord {
    pub pattern: String,
    #[serde(flatten)]
    pub payload: RulePayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, SerdeSerialize, SerdeDeserialize)]
pub struct RawTypedef {
    pub method: String,
    pub argument: u32,
    pub kind: TypedefKind,
    #[serde(default)]
    pub flag: bool,
    #[serde(default)]
    pub constants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl PartialDataset {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            artifact: None,
            records: Vec::new(),
            typedefs: Vec::new(),
            constants: BTreeMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, MergeError> {
        serde_json::from_str(json).map_err(|source| MergeError::Json {
            origin: "<inline>".into(),
            source,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, MergeError> {
        let content = std::fs::read_to_string(path).map_err(|source| MergeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| MergeError::Json {
            origin: path.display().to_string(),
            source,
        })
    }

    /// Appends a record (builder-style, used by tests and tooling).
    pub fn with_record(mut self, pattern: &str, payload: RulePayload) -> Self {
        self.records.push(RawRecord {
            pattern: pattern.to_owned(),
            payload,
            artifact: None,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Visibility;

    const SAMPLE: &str = r#"{
        "source": "google_maven",
        "artifact": "androidx.core:core",
        "records": [
            { "pattern": "android.webkit.WebView#clearCache(boolean)",
              "kind": "deprecated", "replacement": "clearCache2" },
            { "pattern": "com.android.internal.*",
              "kind": "restricted_visibility", "visibility": { "type": "hidden" } },
            { "pattern": "androidx.core.app.A#b()", "kind": "min_api_level", "level": 21,
              "artifact": "androidx.core:core-ktx" }
        ],
        "typedefs": [
            { "method": "android.view.View#setVisibility(int)", "argument": 0,
              "kind": "int", "flag": false,
              "constants": ["android.view.View.VISIBLE", "android.view.View.GONE"] }
        ],
        "constants": { "android.view.View.VISIBLE": "0" }
    }"#;

    #[test]
    fn test_parse_contract() {
        let partial = PartialDataset::from_json_str(SAMPLE).unwrap();
        assert_eq!(partial.source, Source::GoogleMaven);
        assert_eq!(partial.artifact.as_deref(), Some("androidx.core:core"));
        assert_eq!(partial.records.len(), 3);
        assert_eq!(
            partial.records[0].payload,
            RulePayload::Deprecated {
                replacement: Some("clearCache2".into())
            }
        );
        assert_eq!(
            partial.records[1].payload,
            RulePayload::RestrictedVisibility {
                visibility: Visibility::Hidden
            }
        );
        assert_eq!(partial.records[2].payload, RulePayload::MinApiLevel { level: 21 });
        assert_eq!(partial.records[2].artifact.as_deref(), Some("androidx.core:core-ktx"));
        assert_eq!(partial.typedefs[0].kind, TypedefKind::Int);
        assert_eq!(partial.constants.len(), 1);
    }

    #[test]
    fn test_sections_are_optional() {
        let partial = PartialDataset::from_json_str(r#"{"source": "maven_central"}"#).unwrap();
        assert_eq!(partial, PartialDataset::new(Source::MavenCentral));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = PartialDataset::from_json_str(
            r#"{"source": "sdk_lint", "records": [{"pattern": "a.B", "kind": "bogus"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, MergeError::Json { .. }));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdk.json");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(PartialDataset::from_path(&path).unwrap().records.len(), 3);

        let missing = PartialDataset::from_path(&dir.path().join("none.json")).unwrap_err();
        assert!(matches!(missing, MergeError::Io { .. }));
    }
}
