use chrono::{Duration as ChronoDuration, Utc};
use engine::{DeviceState, LoadSource, StateStore};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::tempdir;

// On-disk layout is part of the contract.
const STATE_FILE: &str = "sedum_state.json";
const BACKUP_FILE: &str = "sedum_state.backup.json";
const TEMP_FILE: &str = "sedum_state.json.tmp";

const NO_AUTOSAVE: Duration = Duration::ZERO;

#[tokio::test]
async fn fresh_open_starts_with_defaults() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();

    let recovery = store.recovery();
    assert!(!recovery.recovered_from_crash);
    assert_eq!(recovery.source, LoadSource::Default);
    assert_eq!(recovery.previous_uptime, Duration::ZERO);

    let record = store.snapshot();
    assert_eq!(record.current_mood, "content");
    assert_eq!(record.concern_level, 0);
    assert!(store.is_dirty());
}

#[tokio::test]
async fn crash_is_detected_after_save_without_shutdown() {
    let dir = tempdir().unwrap();
    {
        let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
        store.update(|record| record.current_mood = "worried".to_owned());
        assert!(store.save(false).await.unwrap());
        // dropped without shutdown, like a power cut
    }

    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    assert!(store.recovery().recovered_from_crash);
    assert_eq!(store.snapshot().current_mood, "worried");
}

#[tokio::test]
async fn clean_shutdown_is_not_a_crash() {
    let dir = tempdir().unwrap();
    {
        let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
        store.update(|record| record.concern_level = 3);
        store.shutdown(true).await.unwrap();
    }

    let raw = std::fs::read_to_string(dir.path().join(STATE_FILE)).unwrap();
    let on_disk: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(on_disk["clean_shutdown"], json!(true));

    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    assert!(!store.recovery().recovered_from_crash);
    assert_eq!(store.snapshot().concern_level, 3);
}

#[tokio::test]
async fn previous_uptime_uses_the_crashed_sessions_start() {
    let dir = tempdir().unwrap();
    let mut previous = DeviceState::default();
    previous.started_at = Utc::now() - ChronoDuration::hours(2);
    previous.last_save = Some(previous.started_at + ChronoDuration::hours(1));
    std::fs::write(
        dir.path().join(STATE_FILE),
        serde_json::to_vec(&previous).unwrap(),
    )
    .unwrap();

    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    let recovery = store.recovery();
    assert!(recovery.recovered_from_crash);
    assert_eq!(recovery.previous_uptime, Duration::from_secs(3600));
    // the new session starts now, not two hours ago
    assert!(store.snapshot().started_at > Utc::now() - ChronoDuration::minutes(1));
}

#[tokio::test]
async fn crash_without_a_last_save_reports_zero_uptime() {
    let dir = tempdir().unwrap();
    let previous = DeviceState::default();
    assert!(previous.last_save.is_none());
    std::fs::write(
        dir.path().join(STATE_FILE),
        serde_json::to_vec(&previous).unwrap(),
    )
    .unwrap();

    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    assert!(store.recovery().recovered_from_crash);
    assert_eq!(store.recovery().previous_uptime, Duration::ZERO);
}

#[tokio::test]
async fn corrupt_primary_falls_back_to_backup_not_defaults() {
    let dir = tempdir().unwrap();
    {
        let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
        store.update(|record| record.current_mood = "happy".to_owned());
        store.save(false).await.unwrap();
        store.update(|record| record.current_mood = "proud".to_owned());
        // second save rotates the happy record into the backup slot
        store.save(false).await.unwrap();
    }
    std::fs::write(dir.path().join(STATE_FILE), b"{ definitely not json").unwrap();

    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    assert_eq!(store.recovery().source, LoadSource::Backup);
    assert_eq!(store.snapshot().current_mood, "happy");
}

#[tokio::test]
async fn both_files_corrupt_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(STATE_FILE), b"garbage").unwrap();
    std::fs::write(dir.path().join(BACKUP_FILE), b"more garbage").unwrap();

    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    assert_eq!(store.recovery().source, LoadSource::Default);
    assert!(!store.recovery().recovered_from_crash);
    assert_eq!(store.snapshot().current_mood, "content");
}

#[tokio::test]
async fn unknown_fields_and_old_versions_still_load() {
    let dir = tempdir().unwrap();
    let raw = r#"{
        "version": "0.9",
        "current_mood": "sleepy",
        "concern_level": 2,
        "field_from_the_future": {"nested": true}
    }"#;
    std::fs::write(dir.path().join(STATE_FILE), raw).unwrap();

    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    assert_eq!(store.recovery().source, LoadSource::Primary);
    let record = store.snapshot();
    assert_eq!(record.current_mood, "sleepy");
    assert_eq!(record.concern_level, 2);
    // missing fields filled from defaults
    assert_eq!(record.reminders_sent_today, 0);
}

#[tokio::test]
async fn save_writes_whole_documents_and_cleans_up_the_temp_file() {
    let dir = tempdir().unwrap();
    // a stale temp file from an interrupted previous run
    std::fs::write(dir.path().join(TEMP_FILE), b"half a docu").unwrap();

    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    store.update(|record| record.hydration_count_today = 4);
    store.save(false).await.unwrap();
    store.update(|record| record.hydration_count_today = 5);
    store.save(false).await.unwrap();

    assert!(!dir.path().join(TEMP_FILE).exists());
    let primary: DeviceState =
        serde_json::from_str(&std::fs::read_to_string(store.primary_path()).unwrap()).unwrap();
    let backup: DeviceState =
        serde_json::from_str(&std::fs::read_to_string(store.backup_path()).unwrap()).unwrap();
    assert_eq!(primary.hydration_count_today, 5);
    assert_eq!(backup.hydration_count_today, 4);
}

#[tokio::test]
async fn save_is_a_no_op_while_clean_unless_forced() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();

    assert!(store.save(false).await.unwrap());
    assert!(!store.is_dirty());
    assert!(!store.save(false).await.unwrap());

    store.update(|record| record.movement_count_today += 1);
    assert!(store.is_dirty());
    assert!(store.save(false).await.unwrap());

    // forced save writes even with nothing pending
    assert!(store.save(true).await.unwrap());
}

#[tokio::test]
async fn update_fields_rejects_unknown_names_without_dropping_the_rest() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();

    let mut fields = serde_json::Map::new();
    fields.insert("current_mood".to_owned(), json!("excited"));
    fields.insert("no_such_field".to_owned(), json!(1));
    fields.insert("concern_level".to_owned(), json!("not a number"));

    let report = store.update_fields(fields);
    assert_eq!(report.applied, 1);
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(store.get("current_mood"), Some(json!("excited")));
    assert_eq!(store.get("concern_level"), Some(json!(0)));
    assert_eq!(store.get("no_such_field"), None);
}

#[tokio::test]
async fn concern_level_is_clamped_even_through_raw_updates() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();

    store.update(|record| record.concern_level = 200);
    assert_eq!(store.snapshot().concern_level, engine::MAX_CONCERN);

    store.update(|record| {
        for _ in 0..50 {
            record.escalate_concern();
        }
    });
    assert_eq!(store.snapshot().concern_level, engine::MAX_CONCERN);
}

#[tokio::test]
async fn daily_reset_only_fires_on_a_new_day() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    store.update(|record| {
        record.reminders_sent_today = 6;
        record.hydration_count_today = 2;
    });

    // same day: nothing happens
    store.check_daily_reset();
    assert_eq!(store.snapshot().reminders_sent_today, 6);

    // pretend the last reset was yesterday
    store.update(|record| record.last_stats_reset = Utc::now() - ChronoDuration::days(1));
    store.check_daily_reset();
    let record = store.snapshot();
    assert_eq!(record.reminders_sent_today, 0);
    assert_eq!(record.hydration_count_today, 0);

    // a second check the same day is a no-op
    let stamp = record.last_stats_reset;
    store.check_daily_reset();
    assert_eq!(store.snapshot().last_stats_reset, stamp);
}

#[tokio::test]
async fn auto_save_persists_in_the_background() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path(), Duration::from_millis(50))
        .await
        .unwrap();
    store.update(|record| record.current_mood = "busy".to_owned());
    store.start_auto_save();

    tokio::time::sleep(Duration::from_millis(300)).await;
    store.stop_auto_save().await;

    let on_disk: DeviceState =
        serde_json::from_str(&std::fs::read_to_string(store.primary_path()).unwrap()).unwrap();
    assert_eq!(on_disk.current_mood, "busy");
    assert!(!store.is_dirty());
}

#[tokio::test]
async fn zero_interval_disables_auto_save() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    store.start_auto_save();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.is_dirty());
    assert!(!store.primary_path().exists());
}

#[tokio::test]
async fn clones_share_one_store() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path(), NO_AUTOSAVE).await.unwrap();
    let other = store.clone();

    other.update(|record| record.total_sitting_seconds += 90.0);
    assert_eq!(store.snapshot().total_sitting_seconds, 90.0);
}
