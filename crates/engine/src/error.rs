//! The module contains the errors the engine can throw.
//!
//! - [`Validation`] input rejected before any I/O.
//! - [`Conversion`] the rate snapshot has no usable ratio for a currency.
//! - [`NotProvisioned`] the singleton budget state row does not exist yet.
//! - [`Database`] persistence failure; writes roll back before it surfaces.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Conversion`]: EngineError::Conversion
//!  [`NotProvisioned`]: EngineError::NotProvisioned
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

use crate::cache::CacheError;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Conversion failed: {0}")]
    Conversion(String),
    #[error("Budget state is not provisioned")]
    NotProvisioned,
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Conversion(a), Self::Conversion(b)) => a == b,
            (Self::NotProvisioned, Self::NotProvisioned) => true,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Cache(a), Self::Cache(b)) => a.to_string() == b.to_string(),
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
