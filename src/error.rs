use crate::wizard::Step;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    // Shown as the server sent it.
    #[error("{0}")]
    Connect(String),

    #[error("Failed to load source configuration: {0}")]
    ReferenceFetch(String),

    #[error("Every root folder and enabled quality profile must be mapped")]
    MappingIncomplete,

    #[error("Preview failed: {0}")]
    Preview(String),

    #[error("No items selected for import")]
    EmptySelection,

    #[error("Import failed to start: {0}")]
    Import(String),

    #[error("{action} is not available during the {step} step")]
    WrongStep { action: &'static str, step: Step },

    #[error("Not connected to a source")]
    NotConnected,
}

pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
