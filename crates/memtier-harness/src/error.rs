use memtier_core::ConfigError;
use memtier_core::policy::{CtlError, PolicyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Ctl(#[from] CtlError),
}
