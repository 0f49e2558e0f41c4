//! Rule version lifecycle helpers built on [`TaxRuleRepository`].

use crate::models::{NewTaxRuleVersion, TaxRuleVersion};

use super::repository::{RepositoryError, TaxRuleRepository};

/// Outcome of [`supersede`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superseded {
    pub inserted: TaxRuleVersion,
    /// Previously open-ended versions now closed the day before the new one.
    pub closed: Vec<TaxRuleVersion>,
}

/// Inserts `version` and closes every open-ended, active version of the same
/// kind that started earlier, ending it on the day before the new version
/// takes effect.
///
/// The insert happens first. If a close then fails, both versions stay open
/// and overlap, which the resolver settles in favour of the newer one; the
/// kind is never left without a version in force.
///
/// Versions with an explicit end date are left alone even when they overlap;
/// the resolver's tie-break handles those.
///
/// # Errors
///
/// * [`RepositoryError::InvalidRecord`] if `version` fails validation or
///   starts on the earliest representable date. Nothing is written.
/// * Any store error. A failed insert leaves the store untouched.
pub async fn supersede<R: TaxRuleRepository + ?Sized>(
    repo: &R,
    version: NewTaxRuleVersion,
) -> Result<Superseded, RepositoryError> {
    version
        .validate()
        .map_err(|e| RepositoryError::InvalidRecord(e.to_string()))?;

    let closing_date = version.effective_from.pred_opt().ok_or_else(|| {
        RepositoryError::InvalidRecord(format!(
            "cannot supersede versions before {}",
            version.effective_from
        ))
    })?;

    let to_close: Vec<i64> = repo
        .list_versions(version.kind)
        .await?
        .into_iter()
        .filter(|existing| {
            existing.is_active
                && existing.effective_to.is_none()
                && existing.effective_from < version.effective_from
        })
        .map(|existing| existing.id)
        .collect();

    let inserted = repo.insert_version(version).await?;

    let mut closed = Vec::with_capacity(to_close.len());
    for id in to_close {
        let previous = repo.close_version(id, closing_date).await?;
        tracing::info!(
            id,
            kind = %previous.kind,
            effective_to = %closing_date,
            replaced_by = inserted.id,
            "closed superseded rule version"
        );
        closed.push(previous);
    }

    Ok(Superseded { inserted, closed })
}
