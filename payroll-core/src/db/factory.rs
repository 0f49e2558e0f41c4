//! Backend selection for the rule store.
//!
//! The binary builds a [`RepositoryRegistry`] from every backend crate it
//! links, then opens whichever store [`DbConfig::backend`] names.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::repository::{RepositoryError, TaxRuleRepository};

/// Backend name of the SQLite store in `payroll-db-sqlite`.
pub const SQLITE_BACKEND: &str = "sqlite";

/// Backend name of [`InMemoryRuleStore`](super::InMemoryRuleStore).
pub const MEMORY_BACKEND: &str = "memory";

/// Which rule store to open and how to reach it.
///
/// | backend  | connection_string                            |
/// |----------|----------------------------------------------|
/// | `sqlite` | `payroll.db`, `:memory:`, `sqlite:rules.db`  |
/// | `memory` | ignored; every open yields an empty store    |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub backend: String,
    pub connection_string: String,
}

impl DbConfig {
    pub fn sqlite(connection_string: impl Into<String>) -> Self {
        Self {
            backend: SQLITE_BACKEND.to_string(),
            connection_string: connection_string.into(),
        }
    }

    pub fn memory() -> Self {
        Self {
            backend: MEMORY_BACKEND.to_string(),
            connection_string: String::new(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::sqlite(":memory:")
    }
}

/// Opens one kind of rule store. Each backend crate exports a unit struct
/// implementing this.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    /// Name matched against [`DbConfig::backend`].
    fn backend_name(&self) -> &'static str;

    /// Implementations may run migrations and seeds before returning.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn TaxRuleRepository>, RepositoryError>;
}

/// Rule store factories keyed by backend name.
#[derive(Default)]
pub struct RepositoryRegistry {
    factories: BTreeMap<&'static str, Box<dyn RepositoryFactory>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chaining form of [`register`](Self::register).
    pub fn with(
        mut self,
        factory: Box<dyn RepositoryFactory>,
    ) -> Self {
        self.register(factory);
        self
    }

    /// Adds `factory`, handing back any factory it displaced.
    pub fn register(
        &mut self,
        factory: Box<dyn RepositoryFactory>,
    ) -> Option<Box<dyn RepositoryFactory>> {
        self.factories.insert(factory.backend_name(), factory)
    }

    pub fn supports(
        &self,
        backend: &str,
    ) -> bool {
        self.factories.contains_key(backend)
    }

    /// Registered backend names in alphabetical order.
    pub fn available_backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Opens the store named by `config.backend`.
    ///
    /// # Errors
    /// * [`RepositoryError::Configuration`] if no factory has that name.
    /// * Whatever the factory itself returns.
    pub async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn TaxRuleRepository>, RepositoryError> {
        let Some(factory) = self.factories.get(config.backend.as_str()) else {
            return Err(RepositoryError::Configuration(format!(
                "no rule store backend named '{}' (registered: {})",
                config.backend,
                self.available_backends().join(", ")
            )));
        };

        tracing::debug!(backend = %config.backend, "opening rule store");
        factory.create(config).await
    }
}
