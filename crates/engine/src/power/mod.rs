#![forbid(unsafe_code)]

mod state;

pub use state::{PowerInfo, PowerState};

use crate::{
    Error,
    clock::{Clock, SystemClock},
    task::BackgroundTask,
};
use config::Power as PowerConfig;
use parking_lot::Mutex;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Error type observers may return; failures are logged, never propagated.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type SleepCallback = Arc<dyn Fn(PowerState) -> Result<(), BoxError> + Send + Sync>;
type WakeCallback = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;
type PresenceProbe = Arc<dyn Fn() -> Result<bool, BoxError> + Send + Sync>;

struct PowerBook {
    current: PowerState,
    last_activity: Instant,
    state_changed_at: Instant,
    wake_count: u64,
    total_sleep: Duration,
    last_sleep_start: Option<Instant>,
}

struct Observers {
    on_sleep: Vec<SleepCallback>,
    on_wake: Vec<WakeCallback>,
    presence_probe: Option<PresenceProbe>,
}

struct ControllerShared {
    timeouts: PowerConfig,
    clock: Arc<dyn Clock>,
    started_at: Instant,
    book: Mutex<PowerBook>,
    observers: Mutex<Observers>,
    task: Mutex<Option<BackgroundTask>>,
}

/// Drives the device through its power tiers.
///
/// Inactivity demotes the tier, activity or a positive presence probe
/// wakes it. Observers are notified on every transition; a failing
/// observer is logged and skipped, never aborting the transition.
///
/// Clones share one controller.
#[derive(Clone)]
pub struct PowerController {
    shared: Arc<ControllerShared>,
}

impl PowerController {
    pub fn new(timeouts: PowerConfig) -> Self {
        Self::with_clock(timeouts, Arc::new(SystemClock))
    }

    /// Builds a controller on an explicit [`Clock`], letting tests move
    /// through timeouts without waiting them out.
    pub fn with_clock(timeouts: PowerConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        info!(
            idle_secs = timeouts.idle_timeout.as_secs(),
            light_secs = timeouts.light_sleep_timeout.as_secs(),
            deep_secs = timeouts.deep_sleep_timeout.as_secs(),
            "power controller ready"
        );
        Self {
            shared: Arc::new(ControllerShared {
                timeouts,
                clock,
                started_at: now,
                book: Mutex::new(PowerBook {
                    current: PowerState::Active,
                    last_activity: now,
                    state_changed_at: now,
                    wake_count: 0,
                    total_sleep: Duration::ZERO,
                    last_sleep_start: None,
                }),
                observers: Mutex::new(Observers {
                    on_sleep: Vec::new(),
                    on_wake: Vec::new(),
                    presence_probe: None,
                }),
                task: Mutex::new(None),
            }),
        }
    }

    /// Appends an observer invoked on every transition into a sleep tier,
    /// in registration order.
    pub fn register_sleep_callback(
        &self,
        callback: impl Fn(PowerState) -> Result<(), BoxError> + Send + Sync + 'static,
    ) {
        self.shared.observers.lock().on_sleep.push(Arc::new(callback));
    }

    /// Appends an observer invoked on every wake, in registration order.
    pub fn register_wake_callback(
        &self,
        callback: impl Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    ) {
        self.shared.observers.lock().on_wake.push(Arc::new(callback));
    }

    /// Installs the presence probe sampled while asleep. Replaces any
    /// previously installed probe.
    pub fn register_presence_probe(
        &self,
        probe: impl Fn() -> Result<bool, BoxError> + Send + Sync + 'static,
    ) {
        self.shared.observers.lock().presence_probe = Some(Arc::new(probe));
        info!("presence probe registered");
    }

    /// Records activity now and, if asleep, wakes before returning. A
    /// caller reading [`current_state`] right after this always sees
    /// [`PowerState::Active`].
    ///
    /// [`current_state`]: PowerController::current_state
    pub fn report_activity(&self) {
        let needs_wake = {
            let mut book = self.shared.book.lock();
            book.last_activity = self.shared.clock.now();
            book.current != PowerState::Active
        };
        if needs_wake {
            self.wake_up();
        }
    }

    /// Manual wake with the same observer semantics as a probe wake.
    pub fn force_active(&self) {
        if self.current_state() != PowerState::Active {
            info!("forcing active state");
            self.wake_up();
        }
    }

    /// Manual demotion into `target`. Asking for the active tier is
    /// rejected and changes nothing.
    pub fn force_sleep(&self, target: PowerState) -> Result<(), Error> {
        if !target.is_sleep_tier() {
            return Err(Error::InvalidSleepTarget(target));
        }
        info!(tier = %target, "forcing sleep tier");
        self.enter_sleep(target);
        Ok(())
    }

    pub fn current_state(&self) -> PowerState {
        self.shared.book.lock().current
    }

    /// Read-only snapshot of tier, idle time and counters.
    pub fn state_info(&self) -> PowerInfo {
        let now = self.shared.clock.now();
        let book = self.shared.book.lock();
        PowerInfo {
            state: book.current,
            idle_seconds: now.saturating_duration_since(book.last_activity).as_secs_f64(),
            in_state_seconds: now
                .saturating_duration_since(book.state_changed_at)
                .as_secs_f64(),
            wake_count: book.wake_count,
            total_sleep_seconds: book.total_sleep.as_secs_f64(),
        }
    }

    /// One evaluation step. While active this checks for tier demotion;
    /// while asleep it samples the presence probe. The monitor task calls
    /// this every tick, and tests can drive it directly.
    pub fn poll(&self) {
        if self.current_state() == PowerState::Active {
            self.check_sleep_transition();
        } else {
            self.check_presence();
        }
    }

    /// Spawns the background evaluation loop. Ticks at the evaluation
    /// interval while active and at the presence poll interval while
    /// asleep.
    pub fn start_monitoring(&self) {
        let mut task = self.shared.task.lock();
        if task.is_some() {
            warn!("power monitoring already running");
            return;
        }
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                controller.poll();
                let interval = if controller.current_state() == PowerState::Active {
                    controller.shared.timeouts.evaluation_interval
                } else {
                    controller.shared.timeouts.presence_poll_interval
                };
                tokio::select! {
                    () = token.cancelled() => break,
                    () = controller.shared.clock.sleep(interval) => {}
                }
            }
        });
        *task = Some(BackgroundTask::new(cancel, handle));
        info!("power monitoring started");
    }

    /// Stops the evaluation loop with a bounded wait.
    pub async fn stop_monitoring(&self) {
        let Some(task) = self.shared.task.lock().take() else {
            return;
        };
        task.stop("power-monitor").await;
        info!("power monitoring stopped");
    }

    /// Stops monitoring and logs lifetime statistics.
    pub async fn shutdown(&self) {
        info!("power controller shutting down");
        self.stop_monitoring().await;
        let now = self.shared.clock.now();
        let info = self.state_info();
        info!(
            uptime_secs = now
                .saturating_duration_since(self.shared.started_at)
                .as_secs(),
            wakes = info.wake_count,
            total_sleep_secs = info.total_sleep_seconds,
            "power statistics"
        );
    }

    fn check_sleep_transition(&self) {
        let target = {
            let book = self.shared.book.lock();
            if book.current != PowerState::Active {
                return;
            }
            let idle = self
                .shared
                .clock
                .now()
                .saturating_duration_since(book.last_activity);
            self.deepest_tier_for(idle)
        };
        if let Some(target) = target {
            self.enter_sleep(target);
        }
    }

    /// Deepest tier whose threshold `idle` has crossed, or `None` while
    /// still under the idle timeout. A single evaluation can jump
    /// straight to deep sleep.
    fn deepest_tier_for(&self, idle: Duration) -> Option<PowerState> {
        let timeouts = &self.shared.timeouts;
        if idle >= timeouts.deep_sleep_timeout {
            Some(PowerState::DeepSleep)
        } else if idle >= timeouts.light_sleep_timeout {
            Some(PowerState::LightSleep)
        } else if idle >= timeouts.idle_timeout {
            Some(PowerState::Idle)
        } else {
            None
        }
    }

    fn check_presence(&self) {
        let probe = self.shared.observers.lock().presence_probe.clone();
        let Some(probe) = probe else { return };
        match probe() {
            Ok(true) => {
                debug!("presence detected, waking");
                self.wake_up();
            }
            Ok(false) => {}
            // a faulting probe never transitions state
            Err(err) => warn!(error = %err, "presence probe failed"),
        }
    }

    fn enter_sleep(&self, target: PowerState) {
        let now = self.shared.clock.now();
        let old = {
            let mut book = self.shared.book.lock();
            let old = book.current;
            if old == PowerState::Active {
                book.last_sleep_start = Some(now);
            }
            book.current = target;
            book.state_changed_at = now;
            old
        };
        info!(from = %old, to = %target, "entering sleep tier");
        let callbacks: Vec<SleepCallback> = self.shared.observers.lock().on_sleep.clone();
        for callback in &callbacks {
            if let Err(err) = callback(target) {
                warn!(error = %err, "sleep callback failed");
            }
        }
    }

    fn wake_up(&self) {
        let now = self.shared.clock.now();
        let woke = {
            let mut book = self.shared.book.lock();
            if book.current == PowerState::Active {
                None
            } else {
                let old = book.current;
                if let Some(start) = book.last_sleep_start.take() {
                    book.total_sleep += now.saturating_duration_since(start);
                }
                book.wake_count += 1;
                book.current = PowerState::Active;
                book.state_changed_at = now;
                book.last_activity = now;
                Some((old, book.wake_count))
            }
        };
        let Some((old, wake_count)) = woke else { return };
        info!(from = %old, wake = wake_count, "waking up");
        let callbacks: Vec<WakeCallback> = self.shared.observers.lock().on_wake.clone();
        for callback in &callbacks {
            if let Err(err) = callback() {
                warn!(error = %err, "wake callback failed");
            }
        }
    }
}
