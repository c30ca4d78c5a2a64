//! Persisted settings for the tab hierarchy store.

pub mod store_settings;

pub use store_settings::{SettingsError, SettingsStore, StoreSettings};
