//! # Merge: Source Precedence and Bound Intersection
//!
//! Reconciles partial datasets from the three upstream sources into one
//! [`RuleTable`]. The policy:
//!
//! - Same (pattern, kind): the highest-priority source wins
//!   (SdkLint > GoogleMaven > MavenCentral). Losers are logged, never fatal.
//! - `MinApiLevel` / `MaxApiLevel`: bounds are intersected. The surviving
//!   record is the one that states the binding bound (highest minimum,
//!   lowest maximum); ties keep the higher-priority source.
//! - Typedefs merge per (method, argument) and constants per name, both by
//!   priority.
//! - Malformed patterns and typedef targets are skipped and counted.

pub mod partial;

pub use partial::{PartialDataset, RawRecord, RawTypedef};

use common::container::{SourceGroup, StoredRule, TableEntry};
use common::typedef::{ConstantEntry, TypedefEntry};
use common::{RuleKind, RulePayload, RuleTable, Signature, SignaturePattern, Source};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid partial dataset {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Counters describing one merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inputs: usize,
    /// Surviving records per source.
    pub records_by_source: BTreeMap<Source, usize>,
    /// Lower-priority records with a differing payload that were discarded.
    pub conflicts: usize,
    /// Records identical to one already kept.
    pub duplicates: usize,
    /// API level bounds that met another bound for the same pattern.
    pub intersections: usize,
    /// Entries dropped because their pattern or method did not parse.
    pub skipped: usize,
    pub typedefs: usize,
    pub typedef_conflicts: usize,
    pub constants: usize,
}

impl MergeReport {
    pub fn records(&self) -> usize {
        self.records_by_source.values().sum()
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "merged {} partial dataset(s)", self.inputs)?;
        for source in Source::BY_PRIORITY {
            let count = self.records_by_source.get(&source).copied().unwrap_or(0);
            writeln!(f, "  {:<14} {count} record(s)", source.label())?;
        }
        writeln!(f, "  conflicts      {}", self.conflicts)?;
        writeln!(f, "  duplicates     {}", self.duplicates)?;
        writeln!(f, "  intersections  {}", self.intersections)?;
        writeln!(f, "  skipped        {}", self.skipped)?;
        write!(
            f,
            "  typedefs       {} ({} conflict(s)), constants {}",
            self.typedefs, self.typedef_conflicts, self.constants
        )
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    payload: RulePayload,
    source: Source,
    artifact: Option<String>,
}

/// Accumulates partial datasets and produces the merged table.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    partials: Vec<PartialDataset>,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, partial: PartialDataset) -> &mut Self {
        self.partials.push(partial);
        self
    }

    /// Merges everything added so far. Never fails; see [`MergeReport`].
    pub fn build(mut self) -> (RuleTable, MergeReport) {
        // Stable: partials of the same source keep their insertion order.
        self.partials.sort_by_key(|p| p.source);

        let mut report = MergeReport {
            inputs: self.partials.len(),
            ..MergeReport::default()
        };
        let mut records: BTreeMap<(SignaturePattern, RuleKind), Candidate> = BTreeMap::new();
        let mut typedefs: BTreeMap<(Signature, u32), TypedefEntry> = BTreeMap::new();
        let mut constants: BTreeMap<String, String> = BTreeMap::new();

        for partial in self.partials {
            let source = partial.source;
            for raw in partial.records {
                let pattern = match SignaturePattern::parse(&raw.pattern) {
                    Ok(pattern) => pattern,
                    Err(e) => {
                        tracing::warn!(pattern = %raw.pattern, %source, error = %e, "skipped record with invalid pattern");
                        report.skipped += 1;
                        continue;
                    }
                };
                let candidate = Candidate {
                    payload: raw.payload,
                    source,
                    artifact: raw.artifact.or_else(|| partial.artifact.clone()),
                };
                merge_record(&mut records, pattern, candidate, &mut report);
            }

            for raw in partial.typedefs {
                let method = match Signature::parse(&raw.method) {
                    Ok(method) if method.is_method() => method,
                    Ok(_) => {
                        tracing::warn!(method = %raw.method, %source, "skipped typedef on a non-method");
                        report.skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(method = %raw.method, %source, error = %e, "skipped typedef with invalid method");
                        report.skipped += 1;
                        continue;
                    }
                };
                let key = (method, raw.argument);
                if let Some(kept) = typedefs.get(&key) {
                    if kept.kind != raw.kind || kept.flag != raw.flag || kept.constants != raw.constants {
                        tracing::warn!(
                            method = %key.0,
                            argument = raw.argument,
                            kept = %kept.source,
                            discarded = %source,
                            "typedef conflict, keeping higher-priority source"
                        );
                        report.typedef_conflicts += 1;
                    }
                    continue;
                }
                let entry = TypedefEntry {
                    method: key.0.to_string(),
                    argument: raw.argument,
                    kind: raw.kind,
                    flag: raw.flag,
                    constants: raw.constants,
                    source,
                    artifact: raw.artifact.or_else(|| partial.artifact.clone()),
                };
                typedefs.insert(key, entry);
            }

            for (name, value) in partial.constants {
                match constants.get(&name) {
                    Some(kept) if *kept != value => {
                        tracing::warn!(constant = %name, kept = %kept, discarded = %value, %source, "constant value conflict");
                    }
                    Some(_) => {}
                    None => {
                        constants.insert(name, value);
                    }
                }
            }
        }

        report.typedefs = typedefs.len();
        report.constants = constants.len();

        let mut grouped: BTreeMap<Source, BTreeMap<String, Vec<StoredRule>>> = BTreeMap::new();
        for ((pattern, _), candidate) in records {
            *report.records_by_source.entry(candidate.source).or_insert(0) += 1;
            grouped
                .entry(candidate.source)
                .or_default()
                .entry(pattern.to_string())
                .or_default()
                .push(StoredRule {
                    payload: candidate.payload,
                    artifact: candidate.artifact,
                });
        }

        let table = RuleTable {
            groups: grouped
                .into_iter()
                .map(|(source, entries)| SourceGroup {
                    source,
                    entries: entries
                        .into_iter()
                        .map(|(pattern, rules)| TableEntry { pattern, rules })
                        .collect(),
                })
                .collect(),
            typedefs: typedefs.into_values().collect(),
            constants: constants
                .into_iter()
                .map(|(name, value)| ConstantEntry { name, value })
                .collect(),
        };
        (table, report)
    }
}

/// Convenience wrapper over [`DatasetBuilder`].
pub fn merge<I>(partials: I) -> (RuleTable, MergeReport)
where
    I: IntoIterator<Item = PartialDataset>,
{
    let mut builder = DatasetBuilder::new();
    for partial in partials {
        builder.add(partial);
    }
    builder.build()
}

fn merge_record(
    records: &mut BTreeMap<(SignaturePattern, RuleKind), Candidate>,
    pattern: SignaturePattern,
    candidate: Candidate,
    report: &mut MergeReport,
) {
    let kind = candidate.payload.kind();
    let mut slot = match records.entry((pattern, kind)) {
        Entry::Vacant(slot) => {
            slot.insert(candidate);
            return;
        }
        Entry::Occupied(slot) => slot,
    };
    let pattern = slot.key().0.to_string();
    let kept = slot.get_mut();

    match (api_bound(&kept.payload), api_bound(&candidate.payload)) {
        (Some(old), Some(new)) => {
            report.intersections += 1;
            let tighter = match kind {
                RuleKind::MinApiLevel => new > old,
                _ => new < old,
            };
            tracing::debug!(%pattern, %kind, kept = old, incoming = new, "intersecting API level bounds");
            if tighter {
                *kept = candidate;
            }
        }
        _ if kept.payload == candidate.payload => {
            tracing::debug!(%pattern, %kind, kept = %kept.source, duplicate = %candidate.source, "identical record");
            report.duplicates += 1;
        }
        _ => {
            tracing::warn!(
                %pattern,
                %kind,
                kept = %kept.source,
                discarded = %candidate.source,
                kept_payload = %kept.payload,
                discarded_payload = %candidate.payload,
                "conflicting record discarded"
            );
            report.conflicts += 1;
        }
    }
}

fn api_bound(payload: &RulePayload) -> Option<u32> {
    match payload {
        RulePayload::MinApiLevel { level } | RulePayload::MaxApiLevel { level } => Some(*level),
        _ => None,
    }
}
