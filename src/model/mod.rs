//! Settings Data Model
//!
//! The versioned, section-partitioned configuration tree and the value types
//! that flow around it:
//! - `AppSettings` and its nine sections
//! - Individual setting values and audit events
//! - Export, backup and import reconciliation records

mod change;
mod import;
mod ops;
mod sections;
mod settings;
mod snapshot;
mod value;


pub use change::{keys, ChangeSource, SettingsChangeEvent};
pub use import::{
    ConflictResolution, ImportStrategy, ImportValidation, SettingsConflict, SettingsImportResult,
};
pub use ops::{SettingsResetType, SettingsValidationType, SyncStatus};
pub use sections::{
    AccessibilitySettings, AnalyticsSettings, BibleSettings, DataCollectionLevel, DisplaySettings,
    GeneralSettings, NotificationSettings, PrivacySettings, QuietHours, ReadingMode,
    ReadingPlanSettings, StorageSettings, SyncConflictPolicy, SyncSettings, Theme, TimeOfDay,
};
pub use settings::{AppSettings, SectionValue, SettingsSection, CURRENT_SCHEMA_VERSION};
pub use snapshot::{DeviceInfo, SettingsBackup, SettingsExport};
pub use value::SettingValue;
