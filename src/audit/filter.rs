use serde::Deserialize;
use utoipa::IntoParams;

use super::AuditedRecord;
use crate::error::ValidationError;
use crate::models::AuditEntry;

/// Which entities a read returns, judged by their latest audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchivalFilter {
    #[default]
    ActiveOnly,
    IncludeArchived,
    ArchivedOnly,
}

impl ArchivalFilter {
    pub fn from_flags(
        include_archived: bool,
        just_archived: bool,
    ) -> Result<Self, ValidationError> {
        match (include_archived, just_archived) {
            (false, false) => Ok(ArchivalFilter::ActiveOnly),
            (true, false) => Ok(ArchivalFilter::IncludeArchived),
            (false, true) => Ok(ArchivalFilter::ArchivedOnly),
            (true, true) => Err(ValidationError::ConflictingArchivalFlags),
        }
    }

    /// `latest` is the newest audit entry of the entity. An entity with no
    /// entries is not archived.
    pub fn admits(&self, latest: Option<&AuditEntry>) -> bool {
        let archived = latest.is_some_and(|entry| entry.archived);
        match self {
            ArchivalFilter::ActiveOnly => !archived,
            ArchivalFilter::IncludeArchived => true,
            ArchivalFilter::ArchivedOnly => archived,
        }
    }

    pub fn apply<T>(&self, records: Vec<AuditedRecord<T>>) -> Vec<AuditedRecord<T>> {
        records
            .into_iter()
            .filter(|r| self.admits(r.latest_audit.as_ref()))
            .collect()
    }

    /// True when the filter can return archived entities.
    pub fn reaches_archived(&self) -> bool {
        !matches!(self, ArchivalFilter::ActiveOnly)
    }
}

/// Archival flags as they arrive in a query string.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArchivalParams {
    /// Return archived and active entities together
    #[serde(default)]
    pub include_archived: bool,
    /// Return only archived entities
    #[serde(default)]
    pub just_archived: bool,
}

impl ArchivalParams {
    pub fn filter(&self) -> Result<ArchivalFilter, ValidationError> {
        ArchivalFilter::from_flags(self.include_archived, self.just_archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{AuditOperation, EntityKind};
    use chrono::Utc;

    fn entry(archived: bool) -> AuditEntry {
        let now = Utc::now().naive_utc();
        AuditEntry {
            id: 1,
            operation: AuditOperation::Archive,
            entity_kind: EntityKind::Asset,
            entity_id: Some(1),
            entity_hash: None,
            details: None,
            created_by: None,
            created_at: now,
            last_edited_by: None,
            last_edited_at: None,
            archived,
            archived_at: archived.then_some(now),
        }
    }

    #[test]
    fn test_flags_map_to_filters() {
        assert_eq!(
            ArchivalFilter::from_flags(false, false).unwrap(),
            ArchivalFilter::ActiveOnly
        );
        assert_eq!(
            ArchivalFilter::from_flags(true, false).unwrap(),
            ArchivalFilter::IncludeArchived
        );
        assert_eq!(
            ArchivalFilter::from_flags(false, true).unwrap(),
            ArchivalFilter::ArchivedOnly
        );
    }

    #[test]
    fn test_both_flags_conflict() {
        assert_eq!(
            ArchivalFilter::from_flags(true, true).unwrap_err(),
            ValidationError::ConflictingArchivalFlags
        );
    }

    #[test]
    fn test_admits() {
        let archived = entry(true);
        let active = entry(false);

        assert!(ArchivalFilter::ActiveOnly.admits(None));
        assert!(ArchivalFilter::ActiveOnly.admits(Some(&active)));
        assert!(!ArchivalFilter::ActiveOnly.admits(Some(&archived)));

        assert!(ArchivalFilter::IncludeArchived.admits(Some(&archived)));
        assert!(ArchivalFilter::IncludeArchived.admits(None));

        assert!(ArchivalFilter::ArchivedOnly.admits(Some(&archived)));
        assert!(!ArchivalFilter::ArchivedOnly.admits(Some(&active)));
        assert!(!ArchivalFilter::ArchivedOnly.admits(None));
    }

    #[test]
    fn test_query_params_default_to_active_only() {
        let params = ArchivalParams::default();
        assert_eq!(params.filter().unwrap(), ArchivalFilter::ActiveOnly);
        assert!(!params.filter().unwrap().reaches_archived());
    }
}
