mod settings;

pub use settings::{EngineConfig, SettingsFile};
