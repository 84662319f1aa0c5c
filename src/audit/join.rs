use serde::Serialize;
use std::collections::HashMap;

use super::Audited;
use crate::models::AuditEntry;

/// Left-joins an entity table with its audit entries.
///
/// The join condition matches on the entity kind and on the column holding
/// the entity key: `entity_id` for integer keys (the default) or
/// `entity_hash` for content-addressed tables:
///
/// ```ignore
/// audit_join!(assets, EntityKind::Asset)
/// audit_join!(files, EntityKind::File, hash => entity_hash)
/// ```
///
/// Loading the result yields `(T, Option<AuditEntry>)` rows, one per audit
/// entry, which [`latest_per_entity`] collapses.
#[macro_export]
macro_rules! audit_join {
    ($table:ident, $kind:expr) => {
        $crate::audit_join!($table, $kind, id => entity_id)
    };
    ($table:ident, $kind:expr, $key:ident => $reference:ident) => {
        $crate::schema::$table::table.left_join(
            $crate::schema::audit_entries::table.on(
                $crate::schema::audit_entries::entity_kind
                    .eq($kind)
                    .and(
                        $crate::schema::audit_entries::$reference
                            .eq($crate::schema::$table::$key.nullable()),
                    ),
            ),
        )
    };
}

/// An entity together with the newest audit entry describing it.
#[derive(Debug, Clone, Serialize)]
pub struct AuditedRecord<T> {
    pub record: T,
    pub latest_audit: Option<AuditEntry>,
}

impl<T> AuditedRecord<T> {
    /// Entities with no history count as active.
    pub fn is_archived(&self) -> bool {
        self.latest_audit.as_ref().is_some_and(|a| a.archived)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AuditedRecord<U> {
        AuditedRecord {
            record: f(self.record),
            latest_audit: self.latest_audit,
        }
    }
}

/// Collapses joined rows to one per entity, keeping the entry with the
/// greatest `(created_at, id)`. Entities keep the order of their first row.
pub fn latest_per_entity<T: Audited>(rows: Vec<(T, Option<AuditEntry>)>) -> Vec<AuditedRecord<T>> {
    let mut positions = HashMap::new();
    let mut records: Vec<AuditedRecord<T>> = Vec::new();

    for (record, audit) in rows {
        let key = record.audit_reference();
        match positions.get(&key) {
            Some(&index) => {
                let current: &mut AuditedRecord<T> = &mut records[index];
                if is_newer(audit.as_ref(), current.latest_audit.as_ref()) {
                    current.latest_audit = audit;
                }
            }
            None => {
                positions.insert(key, records.len());
                records.push(AuditedRecord {
                    record,
                    latest_audit: audit,
                });
            }
        }
    }

    records
}

fn is_newer(candidate: Option<&AuditEntry>, current: Option<&AuditEntry>) -> bool {
    match (candidate, current) {
        (Some(candidate), Some(current)) => {
            (candidate.created_at, candidate.id) > (current.created_at, current.id)
        }
        (Some(_), None) => true,
        (None, _) => false,
    }
}
