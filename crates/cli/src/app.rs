use crate::{error::Error, signals::SignalEvent};
use chrono::Utc;
use config::Config;
use engine::{PowerController, StateStore};
use flume::Receiver;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the main loop re-checks the daily counters.
const DAILY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// The assembled daemon: one state store, one power controller, wired
/// together so tier transitions keep the durable record honest.
pub struct App {
    config: Config,
    store: StateStore,
    power: PowerController,
}

impl App {
    /// Opens the store, builds the controller and registers the observers
    /// that mirror power transitions into the record.
    pub async fn bootstrap(config: Config) -> Result<Self, Error> {
        let store = StateStore::open(
            &config.system.data_dir,
            config.persistence.autosave_interval,
        )
        .await?;

        let recovery = store.recovery();
        if recovery.recovered_from_crash {
            warn!(
                previous_uptime_secs = recovery.previous_uptime.as_secs(),
                "recovered from unclean shutdown"
            );
        }

        let power = PowerController::new(config.power.clone());

        let on_sleep = store.clone();
        let save_on_transition = config.persistence.save_on_transition;
        power.register_sleep_callback(move |tier| {
            debug!(%tier, "companion going to sleep");
            on_sleep.update(|record| record.is_sleeping = true);
            if save_on_transition {
                let store = on_sleep.clone();
                tokio::spawn(async move {
                    if let Err(err) = store.save(false).await {
                        warn!(error = %err, "save on sleep entry failed");
                    }
                });
            }
            Ok(())
        });

        let on_wake = store.clone();
        power.register_wake_callback(move || {
            on_wake.update(|record| {
                record.is_sleeping = false;
                record.last_seen = Utc::now();
            });
            Ok(())
        });

        Ok(Self {
            config,
            store,
            power,
        })
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn power(&self) -> &PowerController {
        &self.power
    }

    /// Runs until a terminate event arrives, then shuts down cleanly.
    pub async fn run(&self, events: Receiver<SignalEvent>) {
        self.store.start_auto_save();
        if self.config.power.enabled {
            self.power.start_monitoring();
        } else {
            warn!("power management disabled, companion stays active");
        }

        let mut daily_check = tokio::time::interval(DAILY_CHECK_INTERVAL);
        daily_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                res = events.recv_async() => {
                    match res {
                        Ok(SignalEvent::Terminate) => break,
                        Ok(SignalEvent::Presence) => self.presence_seen(),
                        Ok(SignalEvent::Report) => self.report().await,
                        // the signal task is gone, nothing left to wait for
                        Err(_) => break,
                    }
                }
                _ = daily_check.tick() => self.store.check_daily_reset(),
            }
        }

        self.shutdown().await;
    }

    fn presence_seen(&self) {
        debug!("external presence signal");
        self.power.report_activity();
        self.store.update(|record| record.last_seen = Utc::now());
    }

    async fn report(&self) {
        let power = self.power.state_info();
        let record = self.store.snapshot();
        info!(
            tier = %power.state,
            idle_secs = power.idle_seconds as u64,
            wakes = power.wake_count,
            total_sleep_secs = power.total_sleep_seconds as u64,
            mood = %record.current_mood,
            concern = record.concern_level,
            reminders_today = record.reminders_sent_today,
            "status report"
        );
        if let Err(err) = self.store.save(true).await {
            warn!(error = %err, "status save failed");
        }
    }

    async fn shutdown(&self) {
        info!("shutting down");
        self.power.shutdown().await;
        if let Err(err) = self.store.shutdown(true).await {
            warn!(error = %err, "final state save failed");
        }
    }
}
