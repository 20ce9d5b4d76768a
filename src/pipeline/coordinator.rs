use std::{error::Error, time::Duration};

use thiserror::Error;
use tokio::{
    sync::mpsc::{self, WeakSender},
    time::Instant,
};

use crate::{
    config::DeviceConfig,
    constants::SUPPORTED_VENDOR_IDS,
    drivers::apple_trackpad::{
        parser::{parse, PacketProtocol, ParseContext},
        report::Calibration,
    },
};

use super::{
    client::CoordinatorClient,
    command::Command,
    exchange::{CompletionSink, ExchangeSlot, TransportCompletion},
    pool::{BufferPool, PooledBuffer},
    queue::{QueueError, RequestQueue, Status, UpstreamRequest},
    recovery::{DeviceEvent, RecoveryAction, RecoveryController, TimerGeneration},
    transport::{Transport, TransportError},
};

const BUFFER_SIZE: usize = 2048;

/// Possible errors when creating a coordinator
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("unsupported vendor id: {0:#06x}")]
    UnsupportedDevice(u16),
}

/// Everything the pipeline knows about one device. Owned by the coordinator
/// task and only ever touched from it.
pub struct DeviceContext<T: Transport> {
    name: String,
    transport: T,
    protocol: PacketProtocol,
    calibration: Calibration,
    queue: RequestQueue,
    last_report: Instant,
    recovery: RecoveryController,
    slot: ExchangeSlot,
    pool: BufferPool,
    /// The recovery timer fired while a read was outstanding
    reconfigure_after_read: bool,
    commands: WeakSender<Command>,
}

impl<T: Transport> DeviceContext<T> {
    /// Queue the request and start a read for it if the device is configured
    pub fn submit_upstream_request(&mut self, request: UpstreamRequest) {
        if let Err(QueueError::Full(request)) = self.queue.push(request) {
            log::warn!("{}: Rejecting upstream request, queue is full", self.name);
            request.complete(Status::Rejected, 0);
            return;
        }
        log::trace!("{}: Queued upstream request ({} waiting)", self.name, self.queue.len());

        if self.recovery.is_configured() {
            self.issue_transport_read();
        }
    }

    /// Start a transport read unless one is already outstanding
    pub fn issue_transport_read(&mut self) {
        if self.recovery.has_failed() {
            log::debug!("{}: Device failed, not issuing read", self.name);
            return;
        }
        if self.slot.is_pending() {
            log::trace!("{}: Transport read already outstanding", self.name);
            return;
        }

        let mut request = match self.transport.create_request() {
            Ok(request) => request,
            Err(e) => {
                let reason = format!("failed to create transport request: {e}");
                self.recovery.transport_failed(&reason);
                return;
            }
        };

        let mut buffer = match self.pool.acquire() {
            Ok(buffer) => buffer,
            Err(e) => {
                self.recovery
                    .escalate(format!("failed to allocate transport buffer: {e}"));
                return;
            }
        };

        if let Err(e) = self.transport.format_request(&mut request, &mut buffer) {
            drop(buffer);
            drop(request);
            self.recovery
                .escalate(format!("failed to format transport request: {e}"));
            return;
        }

        let Some(exchange) = self.slot.begin() else {
            return;
        };
        let sink = CompletionSink::new(exchange, self.commands.clone());
        if let Err(e) = self.transport.send_read(request, buffer, sink) {
            self.slot.finish(exchange);
            let reason = format!("failed to send transport read: {e}");
            self.recovery.transport_failed(&reason);
            return;
        }
        log::trace!("{}: Issued transport read {exchange}", self.name);
        self.recovery.mark_configured();
    }

    /// Handle the result of the outstanding transport read
    pub fn on_transport_complete(&mut self, completion: TransportCompletion) {
        let TransportCompletion {
            exchange,
            buffer,
            result,
        } = completion;
        let Some(pending) = self.slot.finish(exchange) else {
            log::debug!("{}: Dropping stale completion for read {exchange}", self.name);
            return;
        };
        log::trace!(
            "{}: Read {} completed after {:?}",
            self.name,
            pending.id,
            pending.started.elapsed()
        );

        let resume = self.reconfigure_after_read && self.finish_deferred_reconfigure();
        self.process_completion(buffer, result);

        // Reads resume as they would have when the timer fired
        if resume && self.recovery.is_configured() && !self.recovery.is_timer_armed() {
            self.issue_transport_read();
        }
    }

    fn process_completion(&mut self, buffer: PooledBuffer, result: Result<usize, TransportError>) {
        if !self.queue.has_waiting() {
            log::debug!("{}: Spurious completion, no request waiting", self.name);
            return;
        }

        let length = match result {
            Ok(length) => length,
            Err(e) => {
                let reason = format!("transport read failed: {e}");
                self.recovery.transport_failed(&reason);
                return;
            }
        };

        let context = ParseContext {
            calibration: self.calibration,
            since_last_report: self.last_report.elapsed(),
        };
        let parsed = parse(self.protocol, buffer.filled(length), &context);
        drop(buffer);

        let err = match parsed {
            Ok(report) => {
                let packed = match report.pack() {
                    Ok(packed) => packed,
                    Err(e) => {
                        self.recovery
                            .malformed_packet(&format!("failed to pack report: {e}"));
                        return;
                    }
                };
                self.last_report = Instant::now();
                if let Some(request) = self.queue.pop() {
                    request.complete_with_report(&packed);
                }
                self.pump();
                return;
            }
            Err(err) => err,
        };

        match RecoveryAction::from(&err) {
            RecoveryAction::ReportDataError => {
                log::warn!("{}: Device data error: {err}", self.name);
                if let Some(request) = self.queue.pop() {
                    request.complete(Status::DeviceDataError, 0);
                }
                self.pump();
            }
            RecoveryAction::ArmTimer => {
                self.recovery.malformed_packet(&err.to_string());
            }
            RecoveryAction::DeferReissue => {
                log::debug!("{}: Reissuing read: {err}", self.name);
                self.recovery.defer_reissue();
            }
        }
    }

    /// Reconfigure the device and resume reading
    pub fn on_recovery_timer(&mut self, generation: TimerGeneration) {
        if !self.recovery.timer_fired(generation) {
            log::trace!("{}: Ignoring replaced recovery timer", self.name);
            return;
        }
        log::debug!("{}: Recovery timer fired", self.name);

        // The transport may hold the device until the read finishes
        if self.slot.is_pending() {
            log::debug!("{}: Reconfiguring after the outstanding read", self.name);
            self.reconfigure_after_read = true;
            return;
        }
        if self.reconfigure_device() {
            self.issue_transport_read();
        }
    }

    fn finish_deferred_reconfigure(&mut self) -> bool {
        self.reconfigure_after_read = false;
        if self.recovery.has_failed() {
            return false;
        }
        self.reconfigure_device()
    }

    /// Put the device back into multitouch mode. Returns false and starts
    /// recovery if that fails.
    fn reconfigure_device(&mut self) -> bool {
        if let Err(e) = self.transport.reconfigure() {
            let reason = format!("failed to reconfigure device: {e}");
            self.recovery.transport_failed(&reason);
            return false;
        }
        self.recovery.mark_configured();
        true
    }

    pub fn on_deferred_reissue(&mut self) {
        self.recovery.deferred_ran();
        self.issue_transport_read();
    }

    /// Keep queued requests moving once a request has been completed
    fn pump(&mut self) {
        if self.recovery.is_configured() && self.queue.has_waiting() {
            self.issue_transport_read();
        }
    }

    pub fn is_configured(&self) -> bool {
        self.recovery.is_configured()
    }
}

/// Serializes every operation on a [DeviceContext] by draining a command
/// channel from a single task.
pub struct Coordinator<T: Transport> {
    context: DeviceContext<T>,
    tx: Option<mpsc::Sender<Command>>,
    rx: mpsc::Receiver<Command>,
}

impl<T: Transport> Coordinator<T> {
    pub fn new(
        transport: T,
        config: &DeviceConfig,
        events: mpsc::Sender<DeviceEvent>,
    ) -> Result<Self, CoordinatorError> {
        let vendor_id = transport.vendor_id();
        if !SUPPORTED_VENDOR_IDS.contains(&vendor_id) {
            return Err(CoordinatorError::UnsupportedDevice(vendor_id));
        }

        let (tx, rx) = mpsc::channel(BUFFER_SIZE);
        let commands = tx.downgrade();
        let pipeline = &config.pipeline;
        let delay = Duration::from_millis(pipeline.recovery_delay_ms);

        let context = DeviceContext {
            name: config.name.clone(),
            protocol: transport.protocol(),
            transport,
            calibration: config.calibration,
            queue: RequestQueue::new(pipeline.queue_capacity),
            last_report: Instant::now(),
            recovery: RecoveryController::new(delay, commands.clone(), events),
            slot: ExchangeSlot::default(),
            pool: BufferPool::new(pipeline.buffer_size, pipeline.pool_capacity),
            reconfigure_after_read: false,
            commands,
        };

        Ok(Self {
            context,
            tx: Some(tx),
            rx,
        })
    }

    /// Returns a client for the coordinator. Clients must be created before
    /// calling [Coordinator::run].
    pub fn client(&self) -> Option<CoordinatorClient> {
        self.tx.as_ref().map(|tx| CoordinatorClient::new(tx.clone()))
    }

    /// Process commands until stopped or every client is dropped
    pub async fn run(mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        // Only clients keep the channel open
        self.tx.take();
        log::debug!("{}: Starting request pipeline", self.context.name);

        while let Some(cmd) = self.rx.recv().await {
            log::trace!("{}: Received command: {cmd:?}", self.context.name);
            match cmd {
                Command::Submit(request) => self.context.submit_upstream_request(request),
                Command::TransportComplete(completion) => {
                    self.context.on_transport_complete(completion)
                }
                Command::RecoveryTimerFired(generation) => {
                    self.context.on_recovery_timer(generation)
                }
                Command::DeferredReissue => self.context.on_deferred_reissue(),
                Command::IsConfigured(sender) => {
                    if let Err(e) = sender.send(self.context.is_configured()).await {
                        log::error!("Failed to send configured state: {e:?}");
                    }
                }
                Command::Stop => break,
            }
        }

        log::debug!("{}: Request pipeline stopped", self.context.name);
        Ok(())
    }
}
