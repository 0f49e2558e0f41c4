//! A process-local rule store.
//!
//! Holds versions in a `Vec` behind an `RwLock`. Used by tests, by the
//! `memory` backend, and anywhere rules are supplied inline rather than
//! loaded from a database.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{NewTaxRuleVersion, TaxKind, TaxRuleVersion};

use super::factory::{DbConfig, MEMORY_BACKEND, RepositoryFactory};
use super::repository::{RepositoryError, TaxRuleRepository};

#[derive(Debug, Default)]
struct Inner {
    versions: Vec<TaxRuleVersion>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    inner: RwLock<Inner>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store holding `versions` exactly as given, ids included.
    ///
    /// No validation is applied, which lets tests reproduce data that a
    /// validating writer would refuse (overlapping ranges, duplicate dates).
    pub fn with_versions(versions: Vec<TaxRuleVersion>) -> Self {
        let next_id = versions.iter().map(|v| v.id).max().unwrap_or(0);
        Self {
            inner: RwLock::new(Inner { versions, next_id }),
        }
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&Inner) -> T,
    ) -> Result<T, RepositoryError> {
        let guard = self
            .inner
            .read()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(f(&guard))
    }

    fn update(
        &self,
        id: i64,
        f: impl FnOnce(&mut TaxRuleVersion) -> Result<(), RepositoryError>,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        let version = guard
            .versions
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(RepositoryError::NotFound)?;
        f(version)?;
        Ok(version.clone())
    }
}

#[async_trait]
impl TaxRuleRepository for InMemoryRuleStore {
    async fn find_active_configs(
        &self,
        kind: TaxKind,
        date: NaiveDate,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError> {
        self.read(|inner| {
            inner
                .versions
                .iter()
                .filter(|v| v.kind == kind && v.applies_on(date))
                .cloned()
                .collect()
        })
    }

    async fn get_version(
        &self,
        id: i64,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        self.read(|inner| inner.versions.iter().find(|v| v.id == id).cloned())?
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_versions(
        &self,
        kind: TaxKind,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError> {
        let mut versions = self.read(|inner| {
            inner
                .versions
                .iter()
                .filter(|v| v.kind == kind)
                .cloned()
                .collect::<Vec<_>>()
        })?;
        versions.sort_by(|a, b| {
            b.effective_from
                .cmp(&a.effective_from)
                .then(b.id.cmp(&a.id))
        });
        Ok(versions)
    }

    async fn insert_version(
        &self,
        version: NewTaxRuleVersion,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        version
            .validate()
            .map_err(|e| RepositoryError::InvalidRecord(e.to_string()))?;

        let mut guard = self
            .inner
            .write()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        guard.next_id += 1;
        let stored = version.with_id(guard.next_id);
        guard.versions.push(stored.clone());
        Ok(stored)
    }

    async fn close_version(
        &self,
        id: i64,
        effective_to: NaiveDate,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        self.update(id, |version| {
            if effective_to < version.effective_from {
                return Err(RepositoryError::InvalidRecord(format!(
                    "effective_to {effective_to} is before effective_from {}",
                    version.effective_from
                )));
            }
            version.effective_to = Some(effective_to);
            Ok(())
        })
    }

    async fn deactivate_version(
        &self,
        id: i64,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        self.update(id, |version| {
            version.is_active = false;
            Ok(())
        })
    }
}

/// Factory for the `memory` backend. The connection string is ignored and
/// every call returns a fresh, empty store.
pub struct InMemoryRepositoryFactory;

#[async_trait]
impl RepositoryFactory for InMemoryRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        MEMORY_BACKEND
    }

    async fn create(
        &self,
        _config: &DbConfig,
    ) -> Result<Box<dyn TaxRuleRepository>, RepositoryError> {
        Ok(Box::new(InMemoryRuleStore::new()))
    }
}
