//! Export and import

use serde_json::Value;
use tracing::{debug, info, warn};

use super::update::join_sections;
use super::SettingsUseCases;
use crate::analytics::{names, AnalyticsEvent};
use crate::audit;
use crate::core::SettingsResult;
use crate::migration::{prepare_settings, PreparedSettings};
use crate::model::{
    AppSettings, ChangeSource, ConflictResolution, ImportStrategy, ImportValidation,
    SettingsConflict, SettingsExport, SettingsImportResult, SettingsSection,
};

fn strategy_name(strategy: ImportStrategy) -> &'static str {
    match strategy {
        ImportStrategy::Replace => "replace",
        ImportStrategy::Merge => "merge",
        ImportStrategy::PreserveLocal => "preserveLocal",
        ImportStrategy::PreserveImported => "preserveImported",
    }
}

/// Section-wise reconciliation of an imported tree against local state
struct Reconciled {
    settings: AppSettings,
    imported: Vec<SettingsSection>,
    skipped: Vec<SettingsSection>,
    conflicts: Vec<SettingsConflict>,
}

fn reconcile(
    local: &AppSettings,
    imported: &AppSettings,
    strategy: ImportStrategy,
) -> SettingsResult<Reconciled> {
    let resolution = match strategy {
        ImportStrategy::Replace => {
            let mut settings = imported.clone();
            settings.touch();
            return Ok(Reconciled {
                settings,
                imported: SettingsSection::ALL.to_vec(),
                skipped: Vec::new(),
                conflicts: Vec::new(),
            });
        }
        ImportStrategy::PreserveLocal => ConflictResolution::UseLocal,
        ImportStrategy::PreserveImported => ConflictResolution::UseImported,
        // field-level merging within a section is not defined yet
        ImportStrategy::Merge => ConflictResolution::Merge,
    };

    let mut reconciled = Reconciled {
        settings: local.clone(),
        imported: Vec::new(),
        skipped: Vec::new(),
        conflicts: Vec::new(),
    };

    for section in local.differing_sections(imported) {
        let conflict = SettingsConflict::new(
            section.as_str(),
            local.section(section).encode()?,
            imported.section(section).encode()?,
        )
        .resolved(resolution.clone());
        reconciled.conflicts.push(conflict);

        if resolution == ConflictResolution::UseLocal {
            reconciled.skipped.push(section);
        } else {
            reconciled.settings.set_section(imported.section(section));
            reconciled.imported.push(section);
        }
    }

    if !reconciled.imported.is_empty() {
        reconciled.settings.touch();
    }

    Ok(reconciled)
}

impl SettingsUseCases {
    /// Snapshot the stored tree for sharing or transfer.
    ///
    /// Sections outside `included_sections` are exported at their defaults.
    /// With `exclude_sensitive_data` the sensitive privacy flags are cleared
    /// while the rest of the privacy section is kept.
    pub async fn export_settings(
        &self,
        included_sections: Option<&[SettingsSection]>,
        exclude_sensitive_data: bool,
    ) -> SettingsResult<SettingsExport> {
        let mut settings = self.repository.get_settings().await?;

        if let Some(included) = included_sections {
            let defaults = self.repository.default_settings();
            for section in SettingsSection::ALL {
                if !included.contains(&section) {
                    settings.set_section(defaults.section(section));
                }
            }
        }

        if exclude_sensitive_data {
            settings.privacy = settings.privacy.redacted();
        }

        let export = SettingsExport::new(settings, self.app_version.clone(), self.device_info.clone());
        info!(export_id = %export.export_id, "Settings exported");
        self.emit(
            AnalyticsEvent::new(names::SETTINGS_EXPORTED)
                .with(
                    "sections",
                    included_sections.map_or_else(|| "all".to_string(), join_sections),
                )
                .with("exclude_sensitive", exclude_sensitive_data),
        );

        Ok(export)
    }

    /// Check an export for schema compatibility and validity without
    /// importing it
    pub async fn validate_import(&self, export: &SettingsExport) -> SettingsResult<ImportValidation> {
        let raw = serde_json::to_value(&export.settings)?;
        let mut validation = prepare_settings(&self.migrations, &self.validator, raw).validation;
        if export.app_version != self.app_version {
            validation
                .warnings
                .push(format!("exported by app version {}", export.app_version));
        }
        Ok(validation)
    }

    /// Import an export document.
    ///
    /// Incompatible or invalid snapshots produce an unsuccessful result and
    /// leave local state untouched. Storage failures are returned as errors.
    pub async fn import_settings(
        &self,
        export: &SettingsExport,
        strategy: ImportStrategy,
    ) -> SettingsResult<SettingsImportResult> {
        let raw = serde_json::to_value(&export.settings)?;
        self.import_tree(raw, strategy).await
    }

    /// Import an export document given as JSON text.
    ///
    /// The embedded tree is migrated before it is deserialized, so exports
    /// written by older app versions keep fields that were renamed since.
    pub async fn import_settings_json(
        &self,
        json: &str,
        strategy: ImportStrategy,
    ) -> SettingsResult<SettingsImportResult> {
        let mut document: Value = match serde_json::from_str(json) {
            Ok(document) => document,
            Err(e) => return Ok(self.import_failed(strategy, vec![format!("malformed export: {}", e)])),
        };

        match document.get_mut("settings").map(Value::take) {
            Some(raw) => self.import_tree(raw, strategy).await,
            None => Ok(self.import_failed(strategy, vec!["export has no settings".to_string()])),
        }
    }

    async fn import_tree(&self, raw: Value, strategy: ImportStrategy) -> SettingsResult<SettingsImportResult> {
        let prepared = prepare_settings(&self.migrations, &self.validator, raw);
        let imported = match prepared.accepted() {
            Some(imported) => imported.clone(),
            None => return Ok(self.import_rejected(strategy, &prepared)),
        };

        let local = self.repository.get_settings().await?;
        let reconciled = reconcile(&local, &imported, strategy)?;

        let errors = self.validator.validate(&reconciled.settings);
        if !errors.is_empty() {
            self.report_validation_failure("import_settings", &errors);
            return Ok(self.import_failed(strategy, errors.iter().map(ToString::to_string).collect()));
        }

        let changed = strategy == ImportStrategy::Replace || !reconciled.imported.is_empty();
        if changed {
            self.repository.save_settings(&reconciled.settings).await?;

            let recorded = match audit::diff(&local, &reconciled.settings, ChangeSource::Sync) {
                Ok(events) => self.tracker.record_all(events).await,
                Err(e) => Err(e),
            };
            if let Err(e) = recorded {
                self.compensate(&local, &e).await;
                return Err(e);
            }
        } else {
            debug!("Import left local settings unchanged");
        }

        info!(
            strategy = strategy_name(strategy),
            imported = reconciled.imported.len(),
            skipped = reconciled.skipped.len(),
            conflicts = reconciled.conflicts.len(),
            "Settings imported"
        );
        self.emit(
            AnalyticsEvent::new(names::SETTINGS_IMPORTED)
                .with("strategy", strategy_name(strategy))
                .with("imported", reconciled.imported.len())
                .with("skipped", reconciled.skipped.len())
                .with("conflicts", reconciled.conflicts.len())
                .with("migrated", prepared.migration.is_some()),
        );

        Ok(SettingsImportResult {
            success: true,
            imported_settings: reconciled.imported.iter().map(|s| s.as_str().to_string()).collect(),
            skipped_settings: reconciled.skipped.iter().map(|s| s.as_str().to_string()).collect(),
            conflicts: reconciled.conflicts,
            errors: Vec::new(),
            import_date: chrono::Utc::now(),
        })
    }

    fn import_rejected(&self, strategy: ImportStrategy, prepared: &PreparedSettings) -> SettingsImportResult {
        let errors = prepared
            .validation
            .errors
            .iter()
            .map(ToString::to_string)
            .collect();
        if prepared.migration.as_ref().is_some_and(|m| !m.success) {
            warn!(strategy = strategy_name(strategy), "Import incompatible with local schema");
        } else {
            self.report_validation_failure("import_settings", &prepared.validation.errors);
        }
        self.import_failed(strategy, errors)
    }

    fn import_failed(&self, strategy: ImportStrategy, errors: Vec<String>) -> SettingsImportResult {
        warn!(strategy = strategy_name(strategy), errors = errors.len(), "Settings import rejected");
        self.emit(
            AnalyticsEvent::new(names::SETTINGS_IMPORT_FAILED)
                .with("strategy", strategy_name(strategy))
                .with("error_count", errors.len()),
        );
        SettingsImportResult::failed(errors)
    }
}
