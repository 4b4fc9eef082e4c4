//! Shared state handed to every HTTP handler.

use crate::{config::InvocationSettings, services::expander::ArchiveExpander};

/// Where per-invocation settings come from.
#[derive(Debug, Clone)]
pub enum SettingsSource {
    /// Read `DST_BUCKET` / `DELETE_SOURCE` / `EXPANDER_PROCESS_ALL_RECORDS`
    /// from the process environment on every request.
    Environment { process_all_records: bool },
    /// Fixed settings, used when embedding the router.
    Fixed(InvocationSettings),
}

impl SettingsSource {
    pub fn current(&self) -> InvocationSettings {
        match self {
            SettingsSource::Environment {
                process_all_records,
            } => InvocationSettings::from_env(*process_all_records),
            SettingsSource::Fixed(settings) => settings.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub expander: ArchiveExpander,
    pub settings: SettingsSource,
}
