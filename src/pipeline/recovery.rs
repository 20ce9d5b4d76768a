use std::time::Duration;

use tokio::{
    sync::mpsc::{self, error::TrySendError, WeakSender},
    task::JoinHandle,
};

use crate::drivers::apple_trackpad::parser::ParseError;

use super::command::Command;

/// Delay before the recovery timer fires
pub const DEFAULT_RECOVERY_DELAY: Duration = Duration::from_secs(3);

/// Identifies one arming of the recovery timer
pub type TimerGeneration = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// The device is in multitouch mode and reads are issued on demand
    Configured,
    /// A transport failure occurred and the recovery timer is pending
    Recovering,
    /// A restart was requested. No further reads are issued.
    Failed,
}

/// Events sent from a coordinator to whoever manages the device lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    RestartRequested(String),
}

/// How the pipeline reacts to a packet that did not decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Complete the oldest upstream request with a data error
    ReportDataError,
    /// Arm the recovery timer and keep the request queued
    ArmTimer,
    /// Reissue a read as soon as possible and keep the request queued
    DeferReissue,
}

impl From<&ParseError> for RecoveryAction {
    fn from(err: &ParseError) -> Self {
        match err {
            ParseError::TooShort { .. } => RecoveryAction::ReportDataError,
            ParseError::MalformedLength(_)
            | ParseError::NoEmbeddedReport(_)
            | ParseError::NestingTooDeep(_)
            | ParseError::Unpack(_) => RecoveryAction::ArmTimer,
            ParseError::Empty | ParseError::UnsupportedKind(_) => RecoveryAction::DeferReissue,
        }
    }
}

/// One-shot timer that sends [Command::RecoveryTimerFired] to the coordinator.
/// Arming it again cancels the pending instance.
#[derive(Debug)]
pub struct RecoveryTimer {
    delay: Duration,
    tx: WeakSender<Command>,
    generation: TimerGeneration,
    handle: Option<JoinHandle<()>>,
}

impl RecoveryTimer {
    pub fn new(delay: Duration, tx: WeakSender<Command>) -> Self {
        Self {
            delay,
            tx,
            generation: 0,
            handle: None,
        }
    }

    pub fn arm(&mut self) -> TimerGeneration {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let delay = self.delay;
        let tx = self.tx.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(tx) = tx.upgrade() else {
                return;
            };
            if let Err(e) = tx.send(Command::RecoveryTimerFired(generation)).await {
                log::debug!("Unable to deliver recovery timer: {e:?}");
            }
        }));
        generation
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Consume a fire event. Returns false for a generation that was
    /// cancelled or replaced.
    fn fired(&mut self, generation: TimerGeneration) -> bool {
        if self.handle.is_none() || generation != self.generation {
            return false;
        }
        self.handle = None;
        true
    }
}

impl Drop for RecoveryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Immediate reissue of a transport read. Scheduling while already queued is
/// a no-op.
#[derive(Debug)]
pub struct DeferredTask {
    tx: WeakSender<Command>,
    queued: bool,
}

impl DeferredTask {
    pub fn new(tx: WeakSender<Command>) -> Self {
        Self { tx, queued: false }
    }

    pub fn schedule(&mut self) -> bool {
        if self.queued {
            return false;
        }
        let Some(tx) = self.tx.upgrade() else {
            return false;
        };
        match tx.try_send(Command::DeferredReissue) {
            Ok(_) => (),
            Err(TrySendError::Full(command)) => {
                tokio::spawn(async move {
                    if let Err(e) = tx.send(command).await {
                        log::debug!("Unable to deliver deferred reissue: {e:?}");
                    }
                });
            }
            Err(TrySendError::Closed(_)) => return false,
        }
        self.queued = true;
        true
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    fn ran(&mut self) {
        self.queued = false;
    }
}

/// Tracks whether the device is configured and decides how failures are
/// retried.
#[derive(Debug)]
pub struct RecoveryController {
    state: RecoveryState,
    timer: RecoveryTimer,
    deferred: DeferredTask,
    events: mpsc::Sender<DeviceEvent>,
}

impl RecoveryController {
    pub fn new(
        delay: Duration,
        tx: WeakSender<Command>,
        events: mpsc::Sender<DeviceEvent>,
    ) -> Self {
        Self {
            state: RecoveryState::Configured,
            timer: RecoveryTimer::new(delay, tx.clone()),
            deferred: DeferredTask::new(tx),
            events,
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    pub fn is_configured(&self) -> bool {
        self.state == RecoveryState::Configured
    }

    pub fn has_failed(&self) -> bool {
        self.state == RecoveryState::Failed
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn is_reissue_queued(&self) -> bool {
        self.deferred.is_queued()
    }

    /// The transport failed. Reads stop until the recovery timer restores
    /// the device.
    pub fn transport_failed(&mut self, reason: &str) {
        if self.has_failed() {
            return;
        }
        log::warn!("Transport failure, recovering in {:?}: {reason}", self.timer.delay);
        self.state = RecoveryState::Recovering;
        self.timer.arm();
    }

    /// The device sent a packet that cannot be framed. The device stays
    /// configured and reads resume once the timer fires.
    pub fn malformed_packet(&mut self, reason: &str) {
        if self.has_failed() {
            return;
        }
        log::warn!("Malformed packet, rearming recovery timer: {reason}");
        self.timer.arm();
    }

    pub fn defer_reissue(&mut self) -> bool {
        if self.has_failed() {
            return false;
        }
        self.deferred.schedule()
    }

    /// Give up on local recovery and ask for the device to be restarted
    pub fn escalate(&mut self, reason: String) {
        if self.has_failed() {
            return;
        }
        log::error!("Requesting device restart: {reason}");
        self.state = RecoveryState::Failed;
        self.timer.cancel();
        if let Err(e) = self.events.try_send(DeviceEvent::RestartRequested(reason)) {
            log::error!("Unable to send restart request: {e:?}");
        }
    }

    pub fn mark_configured(&mut self) {
        if self.state == RecoveryState::Recovering {
            log::info!("Device configured again");
            self.state = RecoveryState::Configured;
        }
    }

    /// Returns true if the fire event belongs to the currently armed timer
    pub fn timer_fired(&mut self, generation: TimerGeneration) -> bool {
        if self.has_failed() {
            return false;
        }
        self.timer.fired(generation)
    }

    pub fn deferred_ran(&mut self) {
        self.deferred.ran();
    }
}
