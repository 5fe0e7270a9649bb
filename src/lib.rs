pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod mapping;
pub mod matcher;
pub mod models;
pub mod monitor;
pub mod preview;
pub mod wizard;

pub use backend::{ApiBackend, MigrationBackend};
pub use error::WizardError;
pub use wizard::{Step, Wizard, WizardOptions};
