use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{NewTaxRuleVersion, TaxKind, TaxRuleVersion};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A record was rejected on write, or a stored row cannot be decoded.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Read and write access to effective-dated rule versions.
///
/// Stores never decide which version applies on a date; they hand back
/// candidates and the resolver picks one. `find_active_configs` may return
/// more rows than apply (a store without date indexes can return every
/// version of the kind) but must never omit one that does.
#[async_trait]
pub trait TaxRuleRepository: Send + Sync {
    /// Versions of `kind` that may be in force on `date`.
    async fn find_active_configs(
        &self,
        kind: TaxKind,
        date: NaiveDate,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError>;

    async fn get_version(
        &self,
        id: i64,
    ) -> Result<TaxRuleVersion, RepositoryError>;

    /// Every version of `kind`, active or not, newest `effective_from` first.
    async fn list_versions(
        &self,
        kind: TaxKind,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError>;

    /// Validates and stores a new version, returning it with its id.
    async fn insert_version(
        &self,
        version: NewTaxRuleVersion,
    ) -> Result<TaxRuleVersion, RepositoryError>;

    /// Sets the inclusive end date of a version.
    ///
    /// # Errors
    ///
    /// * [`RepositoryError::NotFound`] if no version has `id`.
    /// * [`RepositoryError::InvalidRecord`] if `effective_to` is before the
    ///   version's `effective_from`.
    async fn close_version(
        &self,
        id: i64,
        effective_to: NaiveDate,
    ) -> Result<TaxRuleVersion, RepositoryError>;

    /// Switches a version off without deleting it.
    async fn deactivate_version(
        &self,
        id: i64,
    ) -> Result<TaxRuleVersion, RepositoryError>;
}

#[async_trait]
impl<T: TaxRuleRepository + ?Sized> TaxRuleRepository for Box<T> {
    async fn find_active_configs(
        &self,
        kind: TaxKind,
        date: NaiveDate,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError> {
        (**self).find_active_configs(kind, date).await
    }

    async fn get_version(
        &self,
        id: i64,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        (**self).get_version(id).await
    }

    async fn list_versions(
        &self,
        kind: TaxKind,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError> {
        (**self).list_versions(kind).await
    }

    async fn insert_version(
        &self,
        version: NewTaxRuleVersion,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        (**self).insert_version(version).await
    }

    async fn close_version(
        &self,
        id: i64,
        effective_to: NaiveDate,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        (**self).close_version(id, effective_to).await
    }

    async fn deactivate_version(
        &self,
        id: i64,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        (**self).deactivate_version(id).await
    }
}

#[async_trait]
impl<T: TaxRuleRepository + ?Sized> TaxRuleRepository for Arc<T> {
    async fn find_active_configs(
        &self,
        kind: TaxKind,
        date: NaiveDate,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError> {
        (**self).find_active_configs(kind, date).await
    }

    async fn get_version(
        &self,
        id: i64,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        (**self).get_version(id).await
    }

    async fn list_versions(
        &self,
        kind: TaxKind,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError> {
        (**self).list_versions(kind).await
    }

    async fn insert_version(
        &self,
        version: NewTaxRuleVersion,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        (**self).insert_version(version).await
    }

    async fn close_version(
        &self,
        id: i64,
        effective_to: NaiveDate,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        (**self).close_version(id, effective_to).await
    }

    async fn deactivate_version(
        &self,
        id: i64,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        (**self).deactivate_version(id).await
    }
}
