//! Legacy mirror → migration → relation maintenance → search index flows.

mod common;

use citegraph::{
    ControlNumber, LegacyTransformer, Migrator, MirrorSelector, RecordKind, RecordStore, Stage,
};
use common::*;
use std::sync::Arc;
use std::time::Duration;

const CITER_666: &str = "001 666\n\
                         245 $$aThis is a citer record\n\
                         980 $$aHEP\n\
                         999C5 $$0667$$hAchasov, M.N.$$sPhys.Rev.,D97,012008$$y2018$$z0$$z1\n";

const CITED_667: &str = "001 667\n\
                         245 $$aThis is a cited record\n\
                         980 $$aHEP\n";

const INVALID_668: &str = "001 668\n\
                           980 $$aHEP\n\
                           999C5 $$0667$$yDefinitely not a year\n";

const AUTHOR_669: &str = "001 669\n\
                          100 $$aJessica Jones\n\
                          980 $$aHEPNAMES\n";

fn dump(payloads: &[&str]) -> Vec<u8> {
    payloads.join("\n").into_bytes()
}

fn migrator_for(stack: &TestStack) -> Migrator {
    Migrator::new(stack.store.clone(), Arc::new(LegacyTransformer::new()))
}

#[tokio::test]
async fn migrate_then_process_converges_counts_and_index() {
    let stack = stack();
    let migrator = migrator_for(&stack);

    migrator
        .populate_mirror(&dump(&[CITER_666, CITED_667]))
        .unwrap();
    let summary = migrator.migrate(MirrorSelector::Pending).await.unwrap();
    assert_eq!(summary.migrated.len(), 2);

    stack
        .orchestrator
        .dispatch_and_wait(Stage::ProcessReferences, summary.migrated)
        .await
        .unwrap();

    let cited = stack
        .store
        .load_by_control_number(RecordKind::Literature, ControlNumber::new(667))
        .unwrap()
        .unwrap();
    assert_eq!(cited.citation_count, 1);

    // Both records are searchable with their control numbers.
    let citer = stack
        .store
        .load_by_control_number(RecordKind::Literature, ControlNumber::new(666))
        .unwrap()
        .unwrap();
    assert_eq!(
        stack.engine.get(&citer.id).unwrap().control_number,
        ControlNumber::new(666)
    );
    assert_eq!(stack.engine.get(&cited.id).unwrap().citation_count, 1);
}

#[tokio::test]
async fn one_invalid_record_does_not_block_the_batch() {
    let stack = stack();
    let migrator = migrator_for(&stack);

    migrator
        .populate_mirror(&dump(&[CITER_666, CITED_667, INVALID_668, AUTHOR_669]))
        .unwrap();
    let summary = migrator.migrate(MirrorSelector::Pending).await.unwrap();

    assert_eq!(summary.migrated.len(), 3);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].0, ControlNumber::new(668));

    stack
        .orchestrator
        .dispatch_and_wait(Stage::ProcessReferences, summary.migrated)
        .await
        .unwrap();

    // The valid records made it through, relations included.
    let cited = stack
        .store
        .load_by_control_number(RecordKind::Literature, ControlNumber::new(667))
        .unwrap()
        .unwrap();
    assert_eq!(cited.citation_count, 1);

    let author = stack
        .store
        .load_by_control_number(RecordKind::Author, ControlNumber::new(669))
        .unwrap()
        .unwrap();
    assert_eq!(
        stack.engine.get(&author.id).unwrap().control_number,
        ControlNumber::new(669)
    );

    // The invalid one exists only as a flagged mirror row.
    assert!(stack
        .store
        .load_by_control_number(RecordKind::Literature, ControlNumber::new(668))
        .unwrap()
        .is_none());
    let mirror = stack
        .store
        .load_mirror(ControlNumber::new(668))
        .unwrap()
        .unwrap();
    assert!(!mirror.valid);
    assert!(mirror.error.is_some());
}

#[tokio::test]
async fn migration_hands_batches_to_the_worker_pool() {
    let stack = stack();
    let migrator = migrator_for(&stack).with_orchestrator(stack.orchestrator.clone());

    migrator
        .populate_mirror(&dump(&[CITER_666, CITED_667]))
        .unwrap();
    migrator.migrate(MirrorSelector::Pending).await.unwrap();

    // Migration is fire-and-forget; poll until the workers converge.
    let cited_id = stack
        .store
        .load_by_control_number(RecordKind::Literature, ControlNumber::new(667))
        .unwrap()
        .unwrap()
        .id;
    let mut citation_count = 0;
    for _ in 0..50 {
        citation_count = stack
            .store
            .load_record(&cited_id)
            .unwrap()
            .unwrap()
            .citation_count;
        if citation_count == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(citation_count, 1);
}

#[tokio::test]
async fn deleted_legacy_record_migrates_flagged_and_stays_out_of_the_index() {
    let stack = stack();
    let migrator = migrator_for(&stack);

    let deleted = "001 700\n980 $$aHEP$$cDELETED\n";
    migrator.populate_mirror(&dump(&[deleted])).unwrap();
    let summary = migrator.migrate(MirrorSelector::Pending).await.unwrap();
    assert_eq!(summary.migrated.len(), 1);

    stack
        .orchestrator
        .dispatch_and_wait(Stage::ProcessReferences, summary.migrated)
        .await
        .unwrap();

    let record = stack
        .store
        .load_by_control_number(RecordKind::Literature, ControlNumber::new(700))
        .unwrap()
        .unwrap();
    assert!(record.deleted);
    assert!(stack.engine.get(&record.id).is_none());
}

#[tokio::test]
async fn repopulating_a_failed_row_allows_recovery() {
    let stack = stack();
    let migrator = migrator_for(&stack);

    migrator.populate_mirror(&dump(&[INVALID_668])).unwrap();
    let summary = migrator.migrate(MirrorSelector::Pending).await.unwrap();
    assert_eq!(summary.skipped.len(), 1);

    // A corrected dump arrives; the row was never migrated, so its payload
    // is refreshed in place.
    let fixed = "001 668\n980 $$aHEP\n999C5 $$0667$$y2018\n";
    migrator.populate_mirror(&dump(&[fixed])).unwrap();

    let summary = migrator.migrate(MirrorSelector::Pending).await.unwrap();
    assert_eq!(summary.migrated.len(), 1);
    assert!(summary.skipped.is_empty());

    let mirror = stack
        .store
        .load_mirror(ControlNumber::new(668))
        .unwrap()
        .unwrap();
    assert!(mirror.valid);
    assert!(mirror.migrated);
    assert!(mirror.error.is_none());

    assert!(stack
        .store
        .load_by_control_number(RecordKind::Literature, ControlNumber::new(668))
        .unwrap()
        .is_some());
}
