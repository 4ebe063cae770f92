//! # Lookup: Signature to Ordered Findings
//!
//! 1. Exact records for the full signature.
//! 2. Owner prefix records along the owner ancestry, most specific first.
//!    The walk ends after the first level holding a `Removed` or
//!    `RestrictedVisibility` record. A prefix record is shadowed by an exact
//!    record of the same kind.
//! 3. `MinApiLevel`/`MaxApiLevel` candidates are intersected. Only the record
//!    stating the binding bound can report, and only when the call site level
//!    is outside the range.
//! 4. Deduplicate by payload, then stable-sort by severity.

use crate::constants::{self, ArgValue, ConstantResolution};
use crate::context::{QueryContext, QueryError};
use crate::finding::{Finding, MatchScope};
use common::{KindSet, RuleDataset, RuleKind, RulePayload, RuleRecord, Signature};
use std::collections::HashSet;
use std::sync::Arc;

/// Read-only query front end over a shared dataset.
#[derive(Debug, Clone)]
pub struct LookupEngine {
    dataset: Arc<RuleDataset>,
}

struct Candidate<'a> {
    record: &'a RuleRecord,
    scope: MatchScope,
}

impl LookupEngine {
    pub fn new(dataset: Arc<RuleDataset>) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &RuleDataset {
        &self.dataset
    }

    /// Findings for `signature`, most severe first. Unknown signatures yield
    /// an empty vector.
    pub fn find_rules_for(
        &self,
        signature: &Signature,
        context: &QueryContext,
    ) -> Result<Vec<Finding>, QueryError> {
        let api_level = context.validate()?;
        let candidates = self.collect(signature);

        let min = binding_bound(&candidates, RuleKind::MinApiLevel);
        let max = binding_bound(&candidates, RuleKind::MaxApiLevel);
        let bound_violated = |kind: RuleKind, level: u32| match api_level {
            None => context.strict,
            Some(target) if kind == RuleKind::MinApiLevel => target < level,
            Some(target) => target > level,
        };

        let mut seen: HashSet<&RulePayload> = HashSet::new();
        let mut findings = Vec::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            let record = candidate.record;
            let kind = record.kind();
            if kind.is_api_bound() {
                let binding = if kind == RuleKind::MinApiLevel { min } else { max };
                match binding {
                    Some((at, level)) if at == idx && bound_violated(kind, level) => {}
                    _ => continue,
                }
            }
            if seen.insert(&record.payload) {
                findings.push(Finding::from_record(record, candidate.scope.clone()));
            }
        }
        findings.sort_by_key(|f| f.kind().severity());
        Ok(findings)
    }

    /// Parses `text` and runs [`Self::find_rules_for`].
    pub fn find_rules_for_text(
        &self,
        text: &str,
        context: &QueryContext,
    ) -> Result<Vec<Finding>, QueryError> {
        let signature = Signature::parse(text)?;
        self.find_rules_for(&signature, context)
    }

    /// Named-constant replacement for a literal argument of `call`.
    pub fn resolve_argument<I, S>(
        &self,
        call: &Signature,
        supertypes: I,
        argument: u32,
        value: ArgValue<'_>,
    ) -> Result<Option<ConstantResolution>, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        constants::resolve_argument(&self.dataset, call, supertypes, argument, value)
    }

    /// Candidate records in insertion order: exact first, then ancestry levels.
    fn collect<'a>(&'a self, signature: &Signature) -> Vec<Candidate<'a>> {
        let mut candidates = Vec::new();
        let mut exact_kinds = KindSet::empty();
        for record in self.dataset.lookup_exact(signature) {
            exact_kinds |= record.kind().flag();
            candidates.push(Candidate {
                record,
                scope: MatchScope::Exact,
            });
        }

        for (level, records) in self.dataset.lookup_ancestry(signature) {
            let mut stop = false;
            for record in records {
                let kind = record.kind();
                // A shadowed absolute record still ends the walk.
                stop |= kind.is_absolute();
                if exact_kinds.has(kind) {
                    continue;
                }
                candidates.push(Candidate {
                    record,
                    scope: MatchScope::OwnerPrefix(level.to_owned()),
                });
            }
            if stop {
                break;
            }
        }
        candidates
    }
}

/// Index and level of the record stating the tightest bound of `kind`.
/// The first such record wins ties.
fn binding_bound(candidates: &[Candidate<'_>], kind: RuleKind) -> Option<(usize, u32)> {
    let mut best: Option<(usize, u32)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let level = match (&candidate.record.payload, kind) {
            (RulePayload::MinApiLevel { level }, RuleKind::MinApiLevel)
            | (RulePayload::MaxApiLevel { level }, RuleKind::MaxApiLevel) => *level,
            _ => continue,
        };
        let tighter = match best {
            None => true,
            Some((_, current)) if kind == RuleKind::MinApiLevel => level > current,
            Some((_, current)) => level < current,
        };
        if tighter {
            best = Some((idx, level));
        }
    }
    best
}
