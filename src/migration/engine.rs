//! Migration chain runner

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::steps::{AddAnalyticsSection, StorageBytesAndHighlightPalette};
use super::{parse_version, MigrationError, MigrationResult, MigrationStep};
use crate::model::CURRENT_SCHEMA_VERSION;

/// Version assumed for trees that predate the `version` field
pub const INITIAL_SCHEMA_VERSION: &str = "1.0.0";

/// Result of [`MigrationEngine::migrate`]: the report plus the tree to use.
/// On failure `tree` is the untouched input.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub result: MigrationResult,
    pub tree: Value,
}

enum Direction {
    Up,
    Down,
}

/// Migration engine holding the ordered step chain
pub struct MigrationEngine {
    steps: Vec<Box<dyn MigrationStep>>,
    current_version: String,
}

impl MigrationEngine {
    /// Create an engine with every shipped step registered
    pub fn new() -> Self {
        let mut engine = Self::empty(CURRENT_SCHEMA_VERSION);
        engine.register(Box::new(AddAnalyticsSection));
        engine.register(Box::new(StorageBytesAndHighlightPalette));
        engine
    }

    /// Create an engine without steps targeting `current_version`
    pub fn empty(current_version: impl Into<String>) -> Self {
        Self {
            steps: Vec::new(),
            current_version: current_version.into(),
        }
    }

    /// Register a step
    pub fn register(&mut self, step: Box<dyn MigrationStep>) {
        self.steps.push(step);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_step(mut self, step: Box<dyn MigrationStep>) -> Self {
        self.register(step);
        self
    }

    /// Get current version
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Check if a tree at `version` must be migrated before use
    pub fn needs_migration(&self, version: &str) -> bool {
        version != self.current_version
    }

    /// Read the schema version recorded in a raw tree
    pub fn detect_version(tree: &Value) -> String {
        tree.get("version")
            .and_then(Value::as_str)
            .unwrap_or(INITIAL_SCHEMA_VERSION)
            .to_string()
    }

    /// Migrate a raw tree to the current version
    pub fn migrate_to_current(&self, tree: Value) -> MigrationOutcome {
        let from = Self::detect_version(&tree);
        let to = self.current_version.clone();
        self.migrate(tree, &from, &to)
    }

    /// Migrate `tree` from `from` to `to`, upgrading or downgrading.
    ///
    /// Steps run on a working copy; the input is returned unchanged when any
    /// step fails.
    pub fn migrate(&self, tree: Value, from: &str, to: &str) -> MigrationOutcome {
        if from == to {
            return MigrationOutcome {
                result: MigrationResult::up_to_date(from),
                tree,
            };
        }

        match self.apply(tree.clone(), from, to) {
            Ok((migrated, result)) => {
                info!(from, to, "Settings migrated");
                MigrationOutcome {
                    result,
                    tree: migrated,
                }
            }
            Err(e) => {
                warn!(from, to, error = %e, "Settings migration aborted");
                MigrationOutcome {
                    result: MigrationResult {
                        success: false,
                        from_version: from.to_string(),
                        to_version: to.to_string(),
                        migrated_settings: Vec::new(),
                        removed_settings: Vec::new(),
                        added_settings: Vec::new(),
                        errors: vec![e.to_string()],
                        migration_date: Utc::now(),
                    },
                    tree,
                }
            }
        }
    }

    fn apply(
        &self,
        mut tree: Value,
        from: &str,
        to: &str,
    ) -> Result<(Value, MigrationResult), MigrationError> {
        let plan = self.plan(from, to)?;
        let mut result = MigrationResult::up_to_date(from);
        result.to_version = to.to_string();

        for (step, direction) in plan {
            let (target, mut added, mut removed) = match direction {
                Direction::Up => {
                    debug!(step = step.name(), "Applying migration step");
                    tree = step.migrate(tree)?;
                    (step.to_version(), step.added(), step.removed())
                }
                Direction::Down => {
                    debug!(step = step.name(), "Rolling back migration step");
                    tree = step.rollback(tree)?;
                    (step.from_version(), step.removed(), step.added())
                }
            };

            tree.as_object_mut()
                .ok_or_else(|| {
                    MigrationError::InvalidTree("settings tree is not a JSON object".to_string())
                })?
                .insert("version".to_string(), Value::String(target.to_string()));

            result.added_settings.append(&mut added);
            result.removed_settings.append(&mut removed);
            result.migrated_settings.extend(step.transformed());
        }

        Ok((tree, result))
    }

    /// Ordered steps leading from `from` to `to`
    fn plan(&self, from: &str, to: &str) -> Result<Vec<(&dyn MigrationStep, Direction)>, MigrationError> {
        let from_key =
            parse_version(from).ok_or_else(|| MigrationError::UnknownVersion(from.to_string()))?;
        let to_key = parse_version(to).ok_or_else(|| MigrationError::UnknownVersion(to.to_string()))?;

        let mut plan = Vec::new();
        let mut current = from.to_string();

        if from_key < to_key {
            while current != to {
                let step = self
                    .steps
                    .iter()
                    .find(|s| s.from_version() == current)
                    .ok_or_else(|| MigrationError::UnknownVersion(current.clone()))?;
                current = step.to_version().to_string();
                plan.push((step.as_ref(), Direction::Up));
                if plan.len() > self.steps.len() {
                    return Err(MigrationError::UnknownVersion(to.to_string()));
                }
            }
        } else {
            while current != to {
                let step = self
                    .steps
                    .iter()
                    .find(|s| s.to_version() == current)
                    .ok_or_else(|| MigrationError::UnknownVersion(current.clone()))?;
                current = step.from_version().to_string();
                plan.push((step.as_ref(), Direction::Down));
                if plan.len() > self.steps.len() {
                    return Err(MigrationError::UnknownVersion(to.to_string()));
                }
            }
        }

        Ok(plan)
    }
}

impl Default for MigrationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MigrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEngine")
            .field("current_version", &self.current_version)
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}
