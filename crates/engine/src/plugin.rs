//! Host-facing entry point. Activation is fail-soft: a dataset that cannot be
//! loaded disables linting for the session instead of aborting the host.

use crate::config::LinterConfig;
use crate::constants::{ArgValue, ConstantResolution};
use crate::context::{QueryContext, QueryError};
use crate::finding::Finding;
use crate::lookup::LookupEngine;
use common::{RuleDataset, Signature};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginStatus {
    Enabled { records: usize },
    Disabled { reason: String },
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginStatus::Enabled { records } => write!(f, "enabled ({records} rules)"),
            PluginStatus::Disabled { reason } => write!(f, "disabled: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinterPlugin {
    engine: LookupEngine,
    status: PluginStatus,
}

impl LinterPlugin {
    pub const ID: &'static str = "android-linter";

    /// Loads the configured dataset. Never fails.
    pub fn activate(config: &LinterConfig) -> Self {
        match RuleDataset::open(&config.dataset) {
            Ok(dataset) => Self::from_dataset(Arc::new(dataset)),
            Err(e) => {
                tracing::error!(
                    plugin = Self::ID,
                    path = %config.dataset.display(),
                    error = %e,
                    "rule dataset failed to load, linting disabled"
                );
                Self::disabled(e.to_string())
            }
        }
    }

    pub fn from_dataset(dataset: Arc<RuleDataset>) -> Self {
        let status = PluginStatus::Enabled {
            records: dataset.len(),
        };
        Self {
            engine: LookupEngine::new(dataset),
            status,
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            engine: LookupEngine::new(Arc::new(RuleDataset::empty())),
            status: PluginStatus::Disabled {
                reason: reason.into(),
            },
        }
    }

    pub fn status(&self) -> &PluginStatus {
        &self.status
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.status, PluginStatus::Enabled { .. })
    }

    pub fn engine(&self) -> &LookupEngine {
        &self.engine
    }

    pub fn find_rules_for(
        &self,
        signature: &Signature,
        context: &QueryContext,
    ) -> Result<Vec<Finding>, QueryError> {
        self.engine.find_rules_for(signature, context)
    }

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
        self.engine.resolve_argument(call, supertypes, argument, value)
    }
}
