//! # Common: Rule Dataset Model
//!
//! Shared vocabulary for the offline bake step and the runtime engine:
//!
//! - [`signature`]: canonical class/field/method identifiers and patterns.
//! - [`rule`]: rule records, payloads and kinds.
//! - [`typedef`]: `@IntDef`/`@LongDef`/`@StringDef` constant rules.
//! - [`container`]: versioned, checksummed `rkyv` container for the dataset.
//! - [`dataset`]: the loaded, indexed, read-only [`RuleDataset`].

pub mod container;
pub mod dataset;
pub mod rule;
pub mod signature;
pub mod typedef;

pub use container::{DatasetError, PayloadDigest, RuleTable, FORMAT_VERSION};
pub use dataset::{Records, RuleDataset};
pub use rule::{KindSet, RuleKind, RulePayload, RuleRecord, Visibility};
pub use signature::{Signature, SignatureError, SignaturePattern};

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::fmt;

/// Provenance of a rule record.
///
/// Declaration order is merge priority: `SdkLint` outranks `GoogleMaven`,
/// which outranks `MavenCentral`. `Ord` follows the same order, so sorting
/// ascending yields highest priority first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Archive,
    Deserialize,
    Serialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Source {
    /// Android SDK lint database (platform APIs; authoritative).
    SdkLint = 0,
    /// Google's Maven repository (AndroidX, Play services, ...).
    GoogleMaven = 1,
    /// Maven Central.
    MavenCentral = 2,
}

impl Source {
    pub const BY_PRIORITY: [Source; 3] = [Source::SdkLint, Source::GoogleMaven, Source::MavenCentral];

    /// Returns `true` if records from `self` win over records from `other`.
    pub fn outranks(self, other: Source) -> bool {
        self < other
    }

    pub fn label(self) -> &'static str {
        match self {
            Source::SdkLint => "Android SDK",
            Source::GoogleMaven => "Google Maven",
            Source::MavenCentral => "Maven Central",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
