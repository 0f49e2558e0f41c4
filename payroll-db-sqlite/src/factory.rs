use std::path::PathBuf;

use async_trait::async_trait;
use payroll_core::db::{DbConfig, RepositoryFactory, SQLITE_BACKEND};
use payroll_core::{RepositoryError, TaxRuleRepository};

use crate::repository::SqliteRuleRepository;

/// Resolve the seeds directory at runtime so it works in both development and
/// packaged distribution.
///
/// Resolution order:
/// 1. **`PAYROLL_DB_SQLITE_SEEDS_DIR`** if set.
/// 2. **`./seeds`** if the directory exists in the current working directory.
/// 3. **Crate manifest dir**: `$CARGO_MANIFEST_DIR/seeds`.
pub fn seeds_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PAYROLL_DB_SQLITE_SEEDS_DIR") {
        return PathBuf::from(dir);
    }
    let cwd_seeds = PathBuf::from("./seeds");
    if cwd_seeds.is_dir() {
        return cwd_seeds;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seeds")
}

/// Map a connection string to a sqlx SQLite URL.
///
/// * `":memory:"` becomes an in-memory database.
/// * Anything already starting with `sqlite:` passes through.
/// * A bare path is opened read-write and created if missing.
pub fn database_url(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        "sqlite::memory:".to_string()
    } else if connection_string.starts_with("sqlite:") {
        connection_string.to_string()
    } else {
        format!("sqlite:{connection_string}?mode=rwc")
    }
}

/// [`RepositoryFactory`] for SQLite.
///
/// ```rust,no_run
/// use payroll_core::db::RepositoryRegistry;
/// use payroll_db_sqlite::SqliteRepositoryFactory;
///
/// let registry = RepositoryRegistry::new().with(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        SQLITE_BACKEND
    }

    /// Open the database, run migrations, then apply seed files from
    /// [`seeds_dir`].
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn TaxRuleRepository>, RepositoryError> {
        let repo = SqliteRuleRepository::new(&database_url(&config.connection_string))
            .await
            .map_err(|e| RepositoryError::Connection(format!("{e:#}")))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        repo.run_seeds(&seeds_dir())
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        Ok(Box::new(repo))
    }
}
