pub mod batch;
pub mod calculations;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod resolver;

#[cfg(test)]
mod fixtures;

pub use batch::{BatchRun, BatchSummary, WorkerDeductions, WorkerPay, run_batch};
pub use db::{RepositoryError, TaxRuleRepository};
pub use engine::{DeductionEngine, ResolvedRuleSet};
pub use error::{EngineError, InvalidInputError};
pub use models::*;
