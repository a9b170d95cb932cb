//! Shipped schema steps

use serde_json::{Map, Value};

use super::{MigrationError, MigrationStep};
use crate::model::{AnalyticsSettings, DataCollectionLevel};

const MB: u64 = 1024 * 1024;

fn root_object<'a>(
    tree: &'a mut Value,
    step: &dyn MigrationStep,
) -> Result<&'a mut Map<String, Value>, MigrationError> {
    tree.as_object_mut()
        .ok_or_else(|| step_failed(step, "settings tree is not a JSON object"))
}

fn step_failed(step: &dyn MigrationStep, reason: impl Into<String>) -> MigrationError {
    MigrationError::StepFailed {
        from: step.from_version().to_string(),
        to: step.to_version().to_string(),
        reason: reason.into(),
    }
}

/// 1.0.0 -> 1.1.0: introduces the `analytics` section, seeded from the
/// privacy data-collection level the user already chose.
pub struct AddAnalyticsSection;

impl MigrationStep for AddAnalyticsSection {
    fn from_version(&self) -> &'static str {
        "1.0.0"
    }

    fn to_version(&self) -> &'static str {
        "1.1.0"
    }

    fn name(&self) -> &'static str {
        "add analytics section"
    }

    fn added(&self) -> Vec<String> {
        vec!["analytics".to_string()]
    }

    fn migrate(&self, mut tree: Value) -> Result<Value, MigrationError> {
        let level = tree
            .pointer("/privacy/dataCollectionLevel")
            .cloned()
            .map(serde_json::from_value::<DataCollectionLevel>)
            .transpose()
            .map_err(|e| step_failed(self, format!("privacy.dataCollectionLevel: {}", e)))?
            .unwrap_or_default();

        let obj = root_object(&mut tree, self)?;
        if !obj.contains_key("analytics") {
            let analytics = serde_json::to_value(AnalyticsSettings::for_collection_level(level))
                .map_err(|e| step_failed(self, e.to_string()))?;
            obj.insert("analytics".to_string(), analytics);
        }
        Ok(tree)
    }

    fn rollback(&self, mut tree: Value) -> Result<Value, MigrationError> {
        root_object(&mut tree, self)?.remove("analytics");
        Ok(tree)
    }
}

/// 1.1.0 -> 2.0.0: storage budgets move from megabytes to bytes and the
/// single highlight colour becomes a palette.
pub struct StorageBytesAndHighlightPalette;

impl StorageBytesAndHighlightPalette {
    fn mb_to_bytes(&self, storage: &mut Map<String, Value>, old: &str, new: &str) -> Result<(), MigrationError> {
        if let Some(value) = storage.remove(old) {
            let megabytes = value
                .as_u64()
                .ok_or_else(|| step_failed(self, format!("storage.{} is not a whole number", old)))?;
            let bytes = megabytes
                .checked_mul(MB)
                .ok_or_else(|| step_failed(self, format!("storage.{} overflows", old)))?;
            storage.insert(new.to_string(), Value::from(bytes));
        }
        Ok(())
    }

    fn bytes_to_mb(&self, storage: &mut Map<String, Value>, old: &str, new: &str) -> Result<(), MigrationError> {
        if let Some(value) = storage.remove(new) {
            let bytes = value
                .as_u64()
                .ok_or_else(|| step_failed(self, format!("storage.{} is not a whole number", new)))?;
            storage.insert(old.to_string(), Value::from(bytes / MB));
        }
        Ok(())
    }
}

impl MigrationStep for StorageBytesAndHighlightPalette {
    fn from_version(&self) -> &'static str {
        "1.1.0"
    }

    fn to_version(&self) -> &'static str {
        "2.0.0"
    }

    fn name(&self) -> &'static str {
        "storage bytes and highlight palette"
    }

    fn added(&self) -> Vec<String> {
        vec![
            "storage.cacheSizeBytes".to_string(),
            "storage.offlineContentSizeBytes".to_string(),
            "bible.highlightColors".to_string(),
        ]
    }

    fn removed(&self) -> Vec<String> {
        vec![
            "storage.cacheSizeMB".to_string(),
            "storage.offlineContentSizeMB".to_string(),
            "bible.highlightColor".to_string(),
        ]
    }

    fn transformed(&self) -> Vec<String> {
        vec!["storage".to_string(), "bible".to_string()]
    }

    fn migrate(&self, mut tree: Value) -> Result<Value, MigrationError> {
        let obj = root_object(&mut tree, self)?;

        if let Some(storage) = obj.get_mut("storage").and_then(Value::as_object_mut) {
            self.mb_to_bytes(storage, "cacheSizeMB", "cacheSizeBytes")?;
            self.mb_to_bytes(storage, "offlineContentSizeMB", "offlineContentSizeBytes")?;
        }

        if let Some(bible) = obj.get_mut("bible").and_then(Value::as_object_mut) {
            if let Some(color) = bible.remove("highlightColor") {
                let color = color
                    .as_str()
                    .ok_or_else(|| step_failed(self, "bible.highlightColor is not a string"))?
                    .to_string();
                bible
                    .entry("highlightColors")
                    .or_insert_with(|| Value::from(vec![color]));
            }
        }

        Ok(tree)
    }

    fn rollback(&self, mut tree: Value) -> Result<Value, MigrationError> {
        let obj = root_object(&mut tree, self)?;

        if let Some(storage) = obj.get_mut("storage").and_then(Value::as_object_mut) {
            self.bytes_to_mb(storage, "cacheSizeMB", "cacheSizeBytes")?;
            self.bytes_to_mb(storage, "offlineContentSizeMB", "offlineContentSizeBytes")?;
        }

        if let Some(bible) = obj.get_mut("bible").and_then(Value::as_object_mut) {
            if let Some(colors) = bible.remove("highlightColors") {
                if let Some(first) = colors.as_array().and_then(|c| c.first()).cloned() {
                    bible.insert("highlightColor".to_string(), first);
                }
            }
        }

        Ok(tree)
    }
}
