//! Library dependency detection from observed findings.

use crate::constants::ConstantResolution;
use crate::finding::Finding;
use common::Source;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

/// Distinct non-SDK artifacts seen across queries.
///
/// Owned by the host and shared between worker threads; the lookup path
/// itself never writes here.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    seen: Mutex<BTreeSet<String>>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `artifact` if it comes from a library source. Returns `true`
    /// the first time a given artifact is observed.
    pub fn observe(&self, source: Source, artifact: Option<&str>) -> bool {
        let Some(artifact) = artifact else {
            return false;
        };
        if source == Source::SdkLint {
            return false;
        }
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = seen.insert(artifact.to_owned());
        if fresh {
            tracing::info!(%artifact, %source, "detected library dependency");
        }
        fresh
    }

    pub fn observe_findings<'a, I>(&self, findings: I)
    where
        I: IntoIterator<Item = &'a Finding>,
    {
        for finding in findings {
            self.observe(finding.source, finding.artifact.as_deref());
        }
    }

    pub fn observe_resolution(&self, resolution: &ConstantResolution) {
        self.observe(resolution.source, resolution.artifact.as_deref());
    }

    /// Sorted copy of every artifact observed so far.
    pub fn snapshot(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
