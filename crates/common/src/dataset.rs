//! # Rule Dataset: Loaded, Indexed, Read-Only
//!
//! Built once from a validated [`RuleTable`] and never mutated afterwards.
//! Records live in one vector in table order; two hash indexes point into it,
//! one by exact signature and one by owner prefix. All accessors take `&self`,
//! so a dataset behind an `Arc` is safe for unsynchronized concurrent reads.

use crate::container::{self, DatasetError, PayloadDigest, RuleTable};
use crate::rule::{RuleKind, RuleRecord};
use crate::signature::{self, Signature, SignatureError, SignaturePattern};
use crate::typedef::Typedef;
use crate::Source;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

#[derive(Debug)]
pub struct RuleDataset {
    records: Vec<RuleRecord>,
    exact: HashMap<Signature, Vec<usize>>,
    prefixes: HashMap<String, Vec<usize>>,
    typedefs: HashMap<Signature, Vec<Typedef>>,
    digest: Option<PayloadDigest>,
}

impl RuleDataset {
    /// Dataset with no records. Every lookup misses.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            exact: HashMap::new(),
            prefixes: HashMap::new(),
            typedefs: HashMap::new(),
            digest: None,
        }
    }

    /// Opens and fully validates a container file.
    pub fn open(path: &Path) -> Result<Self, DatasetError> {
        let (table, digest) = container::read(path)?;
        let dataset = Self::from_table(table, Some(digest))?;
        tracing::info!(
            path = %path.display(),
            records = dataset.len(),
            typedefs = dataset.typedef_count(),
            digest = %digest,
            "rule dataset loaded"
        );
        Ok(dataset)
    }

    /// Decodes and validates an in-memory container.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatasetError> {
        let (table, digest) = container::decode(bytes)?;
        Self::from_table(table, Some(digest))
    }

    /// Indexes a decoded table.
    ///
    /// Fails with [`DatasetError::Corrupt`] if any pattern or typedef method
    /// does not parse, or if a (pattern, kind) or (method, argument) pair
    /// appears twice. Unresolvable typedef constants are skipped, not fatal.
    pub fn from_table(table: RuleTable, digest: Option<PayloadDigest>) -> Result<Self, DatasetError> {
        let mut dataset = Self::empty();
        dataset.digest = digest;
        let mut seen: HashSet<(SignaturePattern, RuleKind)> = HashSet::new();

        for group in table.groups {
            for entry in group.entries {
                let pattern = SignaturePattern::parse(&entry.pattern).map_err(|e| {
                    DatasetError::Corrupt(format!("invalid pattern `{}`: {e}", entry.pattern))
                })?;
                for rule in entry.rules {
                    let kind = rule.payload.kind();
                    if !seen.insert((pattern.clone(), kind)) {
                        return Err(DatasetError::Corrupt(format!(
                            "duplicate {kind} record for `{pattern}`"
                        )));
                    }
                    dataset.push(RuleRecord {
                        pattern: pattern.clone(),
                        payload: rule.payload,
                        source: group.source,
                        artifact: rule.artifact,
                    });
                }
            }
        }

        let constants: BTreeMap<String, String> = table
            .constants
            .into_iter()
            .map(|c| (c.name, c.value))
            .collect();
        for entry in &table.typedefs {
            let method = Signature::parse(&entry.method).map_err(|e| {
                DatasetError::Corrupt(format!("invalid typedef method `{}`: {e}", entry.method))
            })?;
            if !method.is_method() {
                return Err(DatasetError::Corrupt(format!(
                    "typedef target `{}` is not a method",
                    entry.method
                )));
            }
            let slot = dataset.typedefs.entry(method).or_default();
            if slot.iter().any(|t| t.argument == entry.argument) {
                return Err(DatasetError::Corrupt(format!(
                    "duplicate typedef for argument {} of `{}`",
                    entry.argument, entry.method
                )));
            }
            slot.push(Typedef::resolve(entry, &constants));
        }

        Ok(dataset)
    }

    fn push(&mut self, record: RuleRecord) {
        let idx = self.records.len();
        match &record.pattern {
            SignaturePattern::Exact(sig) => self.exact.entry(sig.clone()).or_default().push(idx),
            SignaturePattern::OwnerPrefix(prefix) => {
                self.prefixes.entry(prefix.clone()).or_default().push(idx)
            }
        }
        self.records.push(record);
    }

    /// Records keyed by exactly `signature`, in dataset order.
    pub fn lookup_exact(&self, signature: &Signature) -> Records<'_> {
        self.indexed(self.exact.get(signature))
    }

    /// Records of the owner prefix pattern `prefix.*`, in dataset order.
    ///
    /// `prefix` is normalized like any owner, so `com/android/internal` and
    /// `Lcom/android/internal;` find the records of `com.android.internal.*`.
    pub fn lookup_by_owner_prefix(&self, prefix: &str) -> Result<Records<'_>, SignatureError> {
        let key = signature::canonical_prefix(prefix)?;
        Ok(self.indexed(self.prefixes.get(&key)))
    }

    /// Prefix records for each level of `signature`'s owner ancestry, most
    /// specific level first.
    pub fn lookup_ancestry<'a, 's>(
        &'a self,
        signature: &'s Signature,
    ) -> impl Iterator<Item = (&'s str, Records<'a>)> {
        signature
            .owner_ancestry()
            .map(move |level| (level, self.indexed(self.prefixes.get(level))))
    }

    fn indexed<'a>(&'a self, slots: Option<&'a Vec<usize>>) -> Records<'a> {
        Records {
            records: &self.records,
            slots: slots.map(Vec::as_slice).unwrap_or_default().iter(),
        }
    }

    /// Typedef rule for one argument of `method`, if declared on exactly this owner.
    pub fn typedef_for(&self, method: &Signature, argument: u32) -> Option<&Typedef> {
        self.typedefs
            .get(method)?
            .iter()
            .find(|t| t.argument == argument)
    }

    /// Number of rule records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RuleRecord] {
        &self.records
    }

    pub fn typedef_count(&self) -> usize {
        self.typedefs.values().map(Vec::len).sum()
    }

    /// Digest of the container payload this dataset was loaded from.
    pub fn digest(&self) -> Option<PayloadDigest> {
        self.digest
    }

    pub fn count_by_source(&self) -> BTreeMap<Source, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.source).or_insert(0) += 1;
        }
        counts
    }

    pub fn count_by_kind(&self) -> BTreeMap<RuleKind, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.kind()).or_insert(0) += 1;
        }
        counts
    }
}

/// Iterator over indexed records of a [`RuleDataset`].
#[derive(Debug, Clone)]
pub struct Records<'a> {
    records: &'a [RuleRecord],
    slots: std::slice::Iter<'a, usize>,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a RuleRecord;

    fn next(&mut self) -> Option<&'a RuleRecord> {
        self.slots.next().map(|&idx| &self.records[idx])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl Default for RuleDataset {
    fn default() -> Self {
        Self::empty()
    }
}
