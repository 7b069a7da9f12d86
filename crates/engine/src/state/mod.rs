#![forbid(unsafe_code)]

mod record;

pub use record::{DeviceState, MAX_CONCERN, STATE_VERSION};

use crate::{Error, task::BackgroundTask};
use chrono::{Local, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STATE_FILE: &str = "sedum_state.json";
const BACKUP_FILE: &str = "sedum_state.backup.json";
const TEMP_FILE: &str = "sedum_state.json.tmp";

/// Where the record produced by [`StateStore::open`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Default,
}

/// Crash verdict produced once at load time.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryInfo {
    /// The previous session ended without an orderly shutdown.
    pub recovered_from_crash: bool,
    /// How long the crashed session had been running, measured from its
    /// `started_at` to its last successful save. Zero when unknown.
    pub previous_uptime: Duration,
    pub source: LoadSource,
}

/// Outcome of a [`StateStore::update_fields`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldUpdateReport {
    /// Number of fields applied.
    pub applied: usize,
    /// Names of fields that were rejected and left unchanged.
    pub rejected: Vec<String>,
}

struct StoreState {
    record: DeviceState,
    dirty: bool,
    /// Bumped on every mutation so `save` only clears the dirty flag when
    /// no update raced the file write.
    generation: u64,
}

struct Shared {
    primary: PathBuf,
    backup: PathBuf,
    temp: PathBuf,
    autosave_interval: Duration,
    state: Mutex<StoreState>,
    /// Serializes writers so two saves never interleave their renames.
    save_lock: tokio::sync::Mutex<()>,
    task: Mutex<Option<BackgroundTask>>,
    recovery: RecoveryInfo,
}

/// Handle to the durable state record.
///
/// Clones share a single store. All mutation goes through [`update`] or
/// [`update_fields`]; the record itself never leaves the store except as
/// a snapshot.
///
/// [`update`]: StateStore::update
/// [`update_fields`]: StateStore::update_fields
#[derive(Clone)]
pub struct StateStore {
    shared: Arc<Shared>,
}

impl StateStore {
    /// Opens the store rooted at `data_dir`, loading the previous record
    /// (falling back to the backup file, then to defaults) and starting a
    /// new session on top of it.
    pub async fn open(
        data_dir: impl AsRef<Path>,
        autosave_interval: Duration,
    ) -> Result<Self, Error> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|source| Error::StateDir {
                path: data_dir.to_owned(),
                source,
            })?;

        let primary = data_dir.join(STATE_FILE);
        let backup = data_dir.join(BACKUP_FILE);
        let (loaded, source) = load_record(&primary, &backup).await;
        let (record, recovery) = begin_session(loaded, source);

        info!(dir = %data_dir.display(), source = ?recovery.source, "state store ready");
        Ok(Self {
            shared: Arc::new(Shared {
                temp: data_dir.join(TEMP_FILE),
                primary,
                backup,
                autosave_interval,
                state: Mutex::new(StoreState {
                    record,
                    // a fresh session always differs from what is on disk
                    dirty: true,
                    generation: 0,
                }),
                save_lock: tokio::sync::Mutex::new(()),
                task: Mutex::new(None),
                recovery,
            }),
        })
    }

    /// The crash verdict computed when the store was opened.
    pub fn recovery(&self) -> RecoveryInfo {
        self.shared.recovery
    }

    pub fn primary_path(&self) -> &Path {
        &self.shared.primary
    }

    pub fn backup_path(&self) -> &Path {
        &self.shared.backup
    }

    /// True when the in-memory record has changes not yet on disk.
    pub fn is_dirty(&self) -> bool {
        self.shared.state.lock().dirty
    }

    /// Applies `mutate` to the record under the store lock and marks the
    /// store dirty. Values pushed out of range are clamped back.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut DeviceState) -> R) -> R {
        let mut state = self.shared.state.lock();
        let out = mutate(&mut state.record);
        state.record.normalize();
        state.dirty = true;
        state.generation += 1;
        out
    }

    /// Applies a map of field updates by name. Unknown and store-owned
    /// fields are rejected with a warning; everything else is applied.
    pub fn update_fields(&self, fields: serde_json::Map<String, Value>) -> FieldUpdateReport {
        let mut report = FieldUpdateReport::default();
        let mut state = self.shared.state.lock();
        for (name, value) in fields {
            match apply_field(&mut state.record, &name, value) {
                Ok(()) => report.applied += 1,
                Err(reason) => {
                    warn!(field = %name, %reason, "ignoring state field update");
                    report.rejected.push(name);
                }
            }
        }
        if report.applied > 0 {
            state.record.normalize();
            state.dirty = true;
            state.generation += 1;
        }
        report
    }

    /// Returns a copy of the whole record.
    pub fn snapshot(&self) -> DeviceState {
        self.shared.state.lock().record.clone()
    }

    /// Returns one field by its JSON name, or `None` if no such field.
    pub fn get(&self, field: &str) -> Option<Value> {
        let record = self.snapshot();
        match serde_json::to_value(&record) {
            Ok(Value::Object(map)) => map.get(field).cloned(),
            _ => None,
        }
    }

    /// Writes the record to disk if it is dirty (or `force` is set).
    ///
    /// Returns `Ok(true)` when a write happened. The write never touches
    /// the primary file in place: the record goes to a temporary file
    /// first, the old primary rotates to the backup, and the temporary is
    /// renamed over the primary.
    pub async fn save(&self, force: bool) -> Result<bool, Error> {
        let _writer = self.shared.save_lock.lock().await;
        let (snapshot, generation) = {
            let mut state = self.shared.state.lock();
            if !state.dirty && !force {
                return Ok(false);
            }
            state.record.last_save = Some(Utc::now());
            (state.record.clone(), state.generation)
        };

        self.write_atomic(&snapshot).await?;

        let mut state = self.shared.state.lock();
        if state.generation == generation {
            state.dirty = false;
        }
        debug!("state saved");
        Ok(true)
    }

    async fn write_atomic(&self, record: &DeviceState) -> Result<(), Error> {
        let bytes = serde_json::to_vec_pretty(record)?;
        let temp = &self.shared.temp;
        let primary = &self.shared.primary;
        let backup = &self.shared.backup;

        let mut file = tokio::fs::File::create(temp)
            .await
            .map_err(|source| Error::WriteState {
                path: temp.clone(),
                source,
            })?;
        file.write_all(&bytes)
            .await
            .map_err(|source| Error::WriteState {
                path: temp.clone(),
                source,
            })?;
        file.sync_all()
            .await
            .map_err(|source| Error::WriteState {
                path: temp.clone(),
                source,
            })?;
        drop(file);

        let had_primary = tokio::fs::try_exists(primary).await.unwrap_or(false);
        if had_primary {
            tokio::fs::rename(primary, backup)
                .await
                .map_err(|source| Error::ReplaceState {
                    path: backup.clone(),
                    source,
                })?;
        }
        if let Err(source) = tokio::fs::rename(temp, primary).await {
            // put the old primary back so a reader never finds nothing
            if had_primary && tokio::fs::rename(backup, primary).await.is_err() {
                warn!("could not restore previous state file after aborted save");
            }
            let _ = tokio::fs::remove_file(temp).await;
            return Err(Error::ReplaceState {
                path: primary.clone(),
                source,
            });
        }
        Ok(())
    }

    /// Spawns the periodic save task. A zero interval disables it.
    pub fn start_auto_save(&self) {
        let mut task = self.shared.task.lock();
        if task.is_some() {
            warn!("auto-save already running");
            return;
        }
        let interval = self.shared.autosave_interval;
        if interval.is_zero() {
            warn!("auto-save disabled by zero interval; relying on explicit saves");
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let store = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick fires immediately; skip it
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = store.save(false).await {
                            warn!(error = %err, "auto-save failed, will retry next interval");
                        }
                    }
                }
            }
        });
        *task = Some(BackgroundTask::new(cancel, handle));
        info!(interval_secs = interval.as_secs(), "auto-save started");
    }

    /// Stops the periodic save task, waiting briefly for a save in flight.
    pub async fn stop_auto_save(&self) {
        let Some(task) = self.shared.task.lock().take() else {
            return;
        };
        task.stop("auto-save").await;
        info!("auto-save stopped");
    }

    /// Final save. With `clean` set the record is marked as an orderly
    /// shutdown, which is what the next session's crash detection reads.
    pub async fn shutdown(&self, clean: bool) -> Result<(), Error> {
        info!(clean, "shutting down state store");
        self.stop_auto_save().await;
        self.update(|record| record.clean_shutdown = clean);
        self.save(true).await?;
        Ok(())
    }

    /// Zeroes the daily counters if the local calendar day has advanced
    /// since the last reset.
    pub fn check_daily_reset(&self) {
        let last_reset = self.shared.state.lock().record.last_stats_reset;
        if Local::now().date_naive() > last_reset.with_timezone(&Local).date_naive() {
            self.reset_daily_stats();
        }
    }

    /// Unconditionally zeroes the daily counters.
    pub fn reset_daily_stats(&self) {
        self.update(|record| record.reset_daily_stats(Utc::now()));
        info!("daily statistics reset");
    }
}

async fn load_record(primary: &Path, backup: &Path) -> (Option<DeviceState>, LoadSource) {
    if let Some(record) = try_load_file(primary).await {
        return (Some(record), LoadSource::Primary);
    }
    if let Some(record) = try_load_file(backup).await {
        info!("recovered state from backup file");
        return (Some(record), LoadSource::Backup);
    }
    (None, LoadSource::Default)
}

async fn try_load_file(path: &Path) -> Option<DeviceState> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read state file");
            return None;
        }
    };
    match serde_json::from_str::<DeviceState>(&raw) {
        Ok(mut record) => {
            if record.version != STATE_VERSION {
                warn!(
                    found = %record.version,
                    expected = STATE_VERSION,
                    "state file schema differs, decoding best-effort"
                );
            }
            record.normalize();
            debug!(path = %path.display(), "loaded state file");
            Some(record)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to parse state file");
            None
        }
    }
}

/// Turns the loaded record into this session's starting record.
///
/// The previous uptime has to be read before `started_at` is reset, or
/// the crash report would measure the wrong session.
fn begin_session(loaded: Option<DeviceState>, source: LoadSource) -> (DeviceState, RecoveryInfo) {
    match loaded {
        Some(mut record) => {
            let recovered = !record.clean_shutdown;
            let previous_uptime = if recovered {
                record
                    .last_save
                    .and_then(|save| (save - record.started_at).to_std().ok())
                    .unwrap_or_default()
            } else {
                Duration::ZERO
            };
            if recovered {
                warn!(
                    uptime_secs = previous_uptime.as_secs(),
                    "previous session did not shut down cleanly"
                );
            } else {
                info!("previous session shut down cleanly");
            }
            record.started_at = Utc::now();
            record.clean_shutdown = false;
            (
                record,
                RecoveryInfo {
                    recovered_from_crash: recovered,
                    previous_uptime,
                    source,
                },
            )
        }
        None => {
            info!("no previous state found, starting fresh");
            (
                DeviceState::default(),
                RecoveryInfo {
                    recovered_from_crash: false,
                    previous_uptime: Duration::ZERO,
                    source,
                },
            )
        }
    }
}

fn apply_field(record: &mut DeviceState, name: &str, value: Value) -> Result<(), String> {
    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, String> {
        serde_json::from_value(value).map_err(|err| err.to_string())
    }
    match name {
        "last_hydration_reminder" => record.last_hydration_reminder = decode(value)?,
        "last_movement_reminder" => record.last_movement_reminder = decode(value)?,
        "last_seen" => record.last_seen = decode(value)?,
        "started_at" => record.started_at = decode(value)?,
        "current_mood" => record.current_mood = decode(value)?,
        "concern_level" => record.concern_level = decode(value)?,
        "is_sleeping" => record.is_sleeping = decode(value)?,
        "sitting_start" => record.sitting_start = decode(value)?,
        "total_sitting_seconds" => record.total_sitting_seconds = decode(value)?,
        "total_standing_seconds" => record.total_standing_seconds = decode(value)?,
        "total_moving_seconds" => record.total_moving_seconds = decode(value)?,
        "reminders_sent_today" => record.reminders_sent_today = decode(value)?,
        "hydration_count_today" => record.hydration_count_today = decode(value)?,
        "movement_count_today" => record.movement_count_today = decode(value)?,
        "last_stats_reset" => record.last_stats_reset = decode(value)?,
        "version" | "last_save" | "clean_shutdown" => {
            return Err("field is owned by the store".to_owned());
        }
        _ => return Err("unknown state field".to_owned()),
    }
    Ok(())
}
