//! Archival state derived from the audit trail.

mod common;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

use common::{create_user, test_conn};
use parm::audit::{self, ArchivalFilter, AuditReference};
use parm::crud::{assets, files};
use parm::enums::{AuditOperation, EntityKind};
use parm::error::{Error, ValidationError};
use parm::models::{Asset, AssetChanges, NewAsset, NewAuditEntry};
use parm::schema::{assets as assets_table, audit_entries};

fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn new_asset(name: &str) -> NewAsset {
    NewAsset {
        name: name.to_string(),
        ..Default::default()
    }
}

/// Inserts an asset row without any audit history.
fn insert_bare_asset(conn: &mut SqliteConnection, id: i32, name: &str) {
    diesel::insert_into(assets_table::table)
        .values((assets_table::id.eq(id), assets_table::name.eq(name)))
        .execute(conn)
        .unwrap();
}

fn audit_count(conn: &mut SqliteConnection) -> i64 {
    audit_entries::table.count().get_result(conn).unwrap()
}

#[test]
fn entity_without_audit_entries_is_active() {
    // Arrange
    let mut conn = test_conn();
    insert_bare_asset(&mut conn, 7, "Fisher dolly");

    // Act
    let active = assets::by_id(&mut conn, 7, ArchivalFilter::ActiveOnly).unwrap();
    let archived = assets::by_id(&mut conn, 7, ArchivalFilter::ArchivedOnly).unwrap();

    // Assert
    let active = active.expect("asset with no history should be active");
    assert!(active.latest_audit.is_none());
    assert!(!active.is_archived());
    assert!(archived.is_none());
}

#[test]
fn newest_entry_decides_archival_state() {
    // Arrange
    let mut conn = test_conn();
    insert_bare_asset(&mut conn, 42, "Steadicam rig");
    let reference = AuditReference::Id(42);

    audit::record(
        &mut conn,
        &NewAuditEntry::new(AuditOperation::Create, EntityKind::Asset, reference.clone(), None)
            .at(at(1)),
    )
    .unwrap();
    audit::record(
        &mut conn,
        &NewAuditEntry::new(AuditOperation::Archive, EntityKind::Asset, reference, None)
            .at(at(5))
            .archived_since(at(5)),
    )
    .unwrap();

    // Act
    let active = assets::by_id(&mut conn, 42, ArchivalFilter::ActiveOnly).unwrap();
    let archived = assets::by_id(&mut conn, 42, ArchivalFilter::ArchivedOnly).unwrap();

    // Assert
    assert!(active.is_none());
    let archived = archived.expect("asset 42 should be archived");
    assert_eq!(archived.latest_audit.unwrap().created_at, at(5));
}

#[test]
fn older_archive_entry_is_overridden_by_newer_active_entry() {
    // Arrange: entries inserted newest first so row order disagrees with time
    let mut conn = test_conn();
    insert_bare_asset(&mut conn, 42, "Steadicam rig");
    let reference = AuditReference::Id(42);

    audit::record(
        &mut conn,
        &NewAuditEntry::new(AuditOperation::Update, EntityKind::Asset, reference.clone(), None)
            .at(at(5)),
    )
    .unwrap();
    audit::record(
        &mut conn,
        &NewAuditEntry::new(AuditOperation::Archive, EntityKind::Asset, reference, None)
            .at(at(1))
            .archived_since(at(1)),
    )
    .unwrap();

    // Act
    let active = assets::by_id(&mut conn, 42, ArchivalFilter::ActiveOnly).unwrap();

    // Assert
    let active = active.expect("newer non-archived entry should win");
    assert_eq!(active.latest_audit.unwrap().created_at, at(5));
}

#[test]
fn entries_of_other_kinds_do_not_affect_an_asset() {
    // Arrange
    let mut conn = test_conn();
    insert_bare_asset(&mut conn, 3, "Jib arm");
    audit::record(
        &mut conn,
        &NewAuditEntry::new(
            AuditOperation::Archive,
            EntityKind::Location,
            AuditReference::Id(3),
            None,
        )
        .archived_since(at(2)),
    )
    .unwrap();

    // Act
    let asset = assets::by_id(&mut conn, 3, ArchivalFilter::ActiveOnly).unwrap();

    // Assert
    assert!(asset.is_some());
}

#[test]
fn list_applies_each_filter() {
    // Arrange
    let mut conn = test_conn();
    let kept = assets::create(&mut conn, None, &new_asset("Kept")).unwrap();
    let shelved = assets::create(&mut conn, None, &new_asset("Shelved")).unwrap();
    assets::update(
        &mut conn,
        None,
        kept.id,
        &AssetChanges {
            description: Some("Edited twice".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assets::archive(&mut conn, None, shelved.id, Some("Lens cracked")).unwrap();

    // Act
    let active = assets::list(&mut conn, ArchivalFilter::ActiveOnly).unwrap();
    let archived = assets::list(&mut conn, ArchivalFilter::ArchivedOnly).unwrap();
    let everything = assets::list(&mut conn, ArchivalFilter::IncludeArchived).unwrap();

    // Assert
    let ids = |records: &[parm::audit::AuditedRecord<Asset>]| {
        records.iter().map(|r| r.record.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&active), vec![kept.id]);
    assert_eq!(ids(&archived), vec![shelved.id]);
    assert_eq!(ids(&everything), vec![kept.id, shelved.id]);
}

#[test]
fn conflicting_archival_flags_are_rejected() {
    assert_eq!(
        ArchivalFilter::from_flags(true, true),
        Err(ValidationError::ConflictingArchivalFlags)
    );
    assert_eq!(
        ArchivalFilter::from_flags(false, true),
        Ok(ArchivalFilter::ArchivedOnly)
    );
}

#[test]
fn archive_then_restore_round_trips_state() {
    // Arrange
    let mut conn = test_conn();
    let asset = assets::create(&mut conn, None, &new_asset("Follow focus")).unwrap();

    // Act
    let archived = assets::archive(&mut conn, None, asset.id, None).unwrap();
    let restored = assets::restore(&mut conn, None, asset.id, None).unwrap();

    // Assert
    assert_eq!(archived.operation, AuditOperation::Archive);
    assert!(archived.archived);
    assert!(archived.archived_at.is_some());
    assert_eq!(restored.operation, AuditOperation::Update);
    assert!(!restored.archived);
    assert_eq!(restored.details.as_deref(), Some("restored"));
    assert!(assets::by_id(&mut conn, asset.id, ArchivalFilter::ActiveOnly)
        .unwrap()
        .is_some());
}

#[test]
fn archiving_twice_is_a_conflict() {
    // Arrange
    let mut conn = test_conn();
    let asset = assets::create(&mut conn, None, &new_asset("Slider")).unwrap();
    assets::archive(&mut conn, None, asset.id, None).unwrap();
    let before = audit_count(&mut conn);

    // Act
    let again = assets::archive(&mut conn, None, asset.id, None);
    let restore_active = assets::restore(&mut conn, None, 999, None);

    // Assert
    assert!(matches!(again, Err(Error::Conflict(_))));
    assert!(matches!(restore_active, Err(Error::NotFound { .. })));
    assert_eq!(audit_count(&mut conn), before);
}

#[test]
fn update_keeps_archived_flag() {
    // Arrange
    let mut conn = test_conn();
    let asset = assets::create(&mut conn, None, &new_asset("Matte box")).unwrap();
    assets::archive(&mut conn, None, asset.id, None).unwrap();

    // Act
    assets::update(
        &mut conn,
        None,
        asset.id,
        &AssetChanges {
            serial_number: Some("MB-1".to_string()),
            ..Default::default()
        },
    )
    .unwrap();

    // Assert
    let record = assets::by_id(&mut conn, asset.id, ArchivalFilter::ArchivedOnly)
        .unwrap()
        .expect("edit must not unarchive");
    let latest = record.latest_audit.unwrap();
    assert_eq!(latest.operation, AuditOperation::Update);
    assert!(latest.archived);
}

#[test]
fn empty_update_is_rejected() {
    let mut conn = test_conn();
    let asset = assets::create(&mut conn, None, &new_asset("Clapper")).unwrap();

    let result = assets::update(&mut conn, None, asset.id, &AssetChanges::default());

    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::EmptyUpdate))
    ));
}

#[test]
fn failed_audit_insert_rolls_back_create() {
    // Arrange: no user 9999, so the audit entry violates its foreign key
    let mut conn = test_conn();

    // Act
    let result = assets::create(&mut conn, Some(9999), &new_asset("Ghost"));

    // Assert
    assert!(result.is_err());
    let count: i64 = assets_table::table.count().get_result(&mut conn).unwrap();
    assert_eq!(count, 0);
    let asset_entries: i64 = audit_entries::table
        .filter(audit_entries::entity_kind.eq(EntityKind::Asset))
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(asset_entries, 0);
}

#[test]
fn failing_edit_leaves_no_trace() {
    // Arrange
    let mut conn = test_conn();
    let asset = assets::create(&mut conn, None, &new_asset("Original")).unwrap();
    let before = audit_count(&mut conn);

    // Act
    let result: parm::error::Result<Option<Asset>> =
        audit::update_audited(&mut conn, None, None, |conn| {
            diesel::update(assets_table::table.find(asset.id))
                .set(assets_table::name.eq("Renamed"))
                .execute(conn)?;
            Err(Error::Conflict("simulated failure".to_string()))
        });

    // Assert
    assert!(result.is_err());
    let stored: Asset = assets_table::table.find(asset.id).first(&mut conn).unwrap();
    assert_eq!(stored.name, "Original");
    assert_eq!(audit_count(&mut conn), before);
}

#[test]
fn delete_closes_history_with_delete_entry() {
    // Arrange
    let mut conn = test_conn();
    let actor = create_user(&mut conn);
    let asset = assets::create(&mut conn, Some(actor.id), &new_asset("Tripod")).unwrap();

    // Act
    assets::delete(&mut conn, Some(actor.id), asset.id).unwrap();

    // Assert
    assert!(assets::by_id(&mut conn, asset.id, ArchivalFilter::IncludeArchived)
        .unwrap()
        .is_none());
    let history = assets::history(&mut conn, asset.id).unwrap();
    let operations: Vec<_> = history.iter().map(|e| e.operation).collect();
    assert_eq!(
        operations,
        vec![AuditOperation::Delete, AuditOperation::Create]
    );
    assert!(history.iter().all(|e| e.created_by == Some(actor.id)));
    assert!(matches!(
        assets::delete(&mut conn, None, asset.id),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn file_entries_reference_the_content_hash() {
    // Arrange
    let mut conn = test_conn();
    let file = files::create(&mut conn, None, None, "call-sheet.pdf", b"day 12").unwrap();

    // Act
    files::archive(&mut conn, None, &file.hash).unwrap();

    // Assert
    let entries = audit::history(
        &mut conn,
        EntityKind::File,
        &AuditReference::Hash(file.hash.clone()),
    )
    .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .all(|e| e.entity_id.is_none() && e.entity_hash.as_deref() == Some(file.hash.as_str())));
    assert!(files::by_hash(&mut conn, &file.hash, ArchivalFilter::ArchivedOnly)
        .unwrap()
        .is_some());
}

#[test]
fn amending_details_stamps_the_editor() {
    // Arrange
    let mut conn = test_conn();
    let editor = create_user(&mut conn);
    let asset = assets::create(&mut conn, None, &new_asset("Monitor")).unwrap();
    let entry = assets::archive(&mut conn, None, asset.id, Some("typo")).unwrap();

    // Act
    let amended = audit::amend_details(&mut conn, entry.id, editor.id, "Sent for repair")
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(amended.details.as_deref(), Some("Sent for repair"));
    assert_eq!(amended.last_edited_by, Some(editor.id));
    assert!(amended.last_edited_at.is_some());
    assert!(amended.archived);
}
