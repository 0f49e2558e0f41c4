pub mod factory;
pub mod lifecycle;
pub mod memory;
pub mod repository;

pub use factory::{
    DbConfig, MEMORY_BACKEND, RepositoryFactory, RepositoryRegistry, SQLITE_BACKEND,
};
pub use lifecycle::{Superseded, supersede};
pub use memory::{InMemoryRepositoryFactory, InMemoryRuleStore};
pub use repository::{RepositoryError, TaxRuleRepository};
