//! # Dataset Container: Versioned rkyv Archive
//!
//! On-disk layout of a baked rule dataset:
//!
//! ```text
//! offset  size  field
//! 0       8     magic  b"APILINT\0"
//! 8       4     format version (u32 LE)
//! 12      4     reserved, zero
//! 16      32    SHA-256 of the payload
//! 48      ..    rkyv archive of `RuleTable`
//! ```
//!
//! Loading validates every layer before anything is handed to the index:
//! header length, magic, version, reserved field, digest, then `bytecheck` validation of the
//! archive itself. There is no partial load.

use crate::typedef::{ConstantEntry, TypedefEntry};
use crate::rule::RulePayload;
use crate::Source;
use memmap2::Mmap;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const MAGIC: [u8; 8] = *b"APILINT\0";
const HEADER_LEN: usize = 48;

/// Container format version understood by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Errors from dataset load and save.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// The resource could not be read at all (DatasetCorrupt family).
    #[error("dataset unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("dataset corrupt: {0}")]
    Corrupt(String),
    #[error("dataset format version {found} is not supported (expected {supported})")]
    VersionMismatch { found: u32, supported: u32 },
    #[error("dataset serialization failed: {0}")]
    Encode(String),
    #[error("cannot write dataset {}: {source}", path.display())]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// SHA-256 of a container payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadDigest(pub [u8; 32]);

impl PayloadDigest {
    pub fn of(payload: &[u8]) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(payload));
        Self(out)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PayloadDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One stored rule under a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub struct StoredRule {
    pub payload: RulePayload,
    pub artifact: Option<String>,
}

/// All rules of one pattern within a source group.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub struct TableEntry {
    /// Canonical pattern text (`pkg.Cls#m(int)` or `pkg.*`).
    pub pattern: String,
    pub rules: Vec<StoredRule>,
}

/// Records that survived the merge for one source.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub struct SourceGroup {
    pub source: Source,
    pub entries: Vec<TableEntry>,
}

/// Serialized form of a merged rule dataset, grouped by source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub struct RuleTable {
    pub groups: Vec<SourceGroup>,
    pub typedefs: Vec<TypedefEntry>,
    pub constants: Vec<ConstantEntry>,
}

impl RuleTable {
    /// Number of rule records across all groups.
    pub fn record_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.entries.iter())
            .map(|e| e.rules.len())
            .sum()
    }

    /// Serializes the table into a complete container (header + payload).
    pub fn to_bytes(&self) -> Result<Vec<u8>, DatasetError> {
        let payload = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| DatasetError::Encode(e.to_string()))?;
        let digest = PayloadDigest::of(&payload);

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&digest.0);
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Writes the container to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<PayloadDigest, DatasetError> {
        let bytes = self.to_bytes()?;
        let unwritable = |source: std::io::Error| DatasetError::Unwritable {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(unwritable)?;
        }
        let mut file = File::create(path).map_err(unwritable)?;
        file.write_all(&bytes).map_err(unwritable)?;
        Ok(PayloadDigest::of(&bytes[HEADER_LEN..]))
    }
}

/// Validates a container and deserializes its table.
pub fn decode(bytes: &[u8]) -> Result<(RuleTable, PayloadDigest), DatasetError> {
    if bytes.len() < HEADER_LEN {
        return Err(DatasetError::Corrupt(format!(
            "truncated header ({} bytes)",
            bytes.len()
        )));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if header[..8] != MAGIC {
        return Err(DatasetError::Corrupt("not an apilint dataset (bad magic)".into()));
    }
    let found = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
    if found != FORMAT_VERSION {
        return Err(DatasetError::VersionMismatch {
            found,
            supported: FORMAT_VERSION,
        });
    }
    if header[12..16] != [0u8; 4] {
        return Err(DatasetError::Corrupt("reserved header bytes are not zero".into()));
    }
    let digest = PayloadDigest::of(payload);
    if header[16..HEADER_LEN] != digest.0 {
        return Err(DatasetError::Corrupt("payload digest mismatch".into()));
    }

    // The payload follows the header, so its alignment is not guaranteed for
    // every caller. Copy it into an aligned buffer before validation.
    let mut aligned: AlignedVec = AlignedVec::with_capacity(payload.len());
    aligned.extend_from_slice(payload);
    let table = rkyv::from_bytes::<RuleTable, rkyv::rancor::Error>(&aligned)
        .map_err(|e| DatasetError::Corrupt(format!("archive validation failed: {e}")))?;
    Ok((table, digest))
}

/// Opens a container file via mmap and decodes it.
pub fn read(path: &Path) -> Result<(RuleTable, PayloadDigest), DatasetError> {
    let file = File::open(path)?;
    // SAFETY: The file is opened read-only and the map is dropped before this
    // function returns; everything handed out is an owned copy.
    let mmap = unsafe { Mmap::map(&file)? };
    decode(&mmap)
}
