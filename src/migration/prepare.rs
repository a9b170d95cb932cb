//! Turning an untrusted raw tree into a current, validated one

use serde_json::Value;

use super::{MigrationEngine, MigrationResult};
use crate::model::{AppSettings, ImportValidation};
use crate::validation::{SettingsValidator, ValidationError};

/// A raw tree after version check, migration and validation
#[derive(Debug, Clone)]
pub struct PreparedSettings {
    pub validation: ImportValidation,
    /// The current-version tree; `None` when it could not be produced
    pub settings: Option<AppSettings>,
    /// Present when a migration ran
    pub migration: Option<MigrationResult>,
}

impl PreparedSettings {
    fn rejected(requires_migration: bool, error: ValidationError) -> Self {
        Self {
            validation: ImportValidation {
                is_valid: false,
                requires_migration,
                errors: vec![error],
                warnings: Vec::new(),
            },
            settings: None,
            migration: None,
        }
    }

    /// Settings ready to persist, if every check passed
    pub fn accepted(&self) -> Option<&AppSettings> {
        if self.validation.is_valid {
            self.settings.as_ref()
        } else {
            None
        }
    }
}

/// Check schema compatibility, migrate when needed, then validate the result
pub fn prepare_settings(
    engine: &MigrationEngine,
    validator: &SettingsValidator,
    raw: Value,
) -> PreparedSettings {
    if !raw.is_object() {
        return PreparedSettings::rejected(
            false,
            ValidationError::new("settings", "settings tree is not a JSON object"),
        );
    }

    let version = MigrationEngine::detect_version(&raw);
    let requires_migration = engine.needs_migration(&version);

    let (tree, migration) = if requires_migration {
        let outcome = engine.migrate(raw, &version, engine.current_version());
        if !outcome.result.success {
            let reason = outcome.result.errors.join("; ");
            let mut prepared = PreparedSettings::rejected(
                true,
                ValidationError::new(
                    "version",
                    format!("cannot migrate from {}: {}", version, reason),
                ),
            );
            prepared.migration = Some(outcome.result);
            return prepared;
        }
        (outcome.tree, Some(outcome.result))
    } else {
        (raw, None)
    };

    let settings: AppSettings = match serde_json::from_value(tree) {
        Ok(settings) => settings,
        Err(e) => {
            let mut prepared = PreparedSettings::rejected(
                requires_migration,
                ValidationError::new("settings", format!("malformed settings: {}", e)),
            );
            prepared.migration = migration;
            return prepared;
        }
    };

    let errors = validator.validate(&settings);
    let mut warnings = Vec::new();
    if let Some(result) = &migration {
        warnings.push(format!(
            "migrated from {} to {}",
            result.from_version, result.to_version
        ));
    }

    PreparedSettings {
        validation: ImportValidation {
            is_valid: errors.is_empty(),
            requires_migration,
            errors,
            warnings,
        },
        settings: Some(settings),
        migration,
    }
}
