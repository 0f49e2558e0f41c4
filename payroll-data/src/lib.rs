pub mod loader;

pub use loader::{LoadMode, LoadReport, RuleLoaderError, RuleVersionLoader, RuleVersionRecord};
