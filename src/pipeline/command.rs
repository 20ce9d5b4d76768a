use tokio::sync::mpsc;

use super::{exchange::TransportCompletion, queue::UpstreamRequest, recovery::TimerGeneration};

/// Commands handled by the coordinator task
#[derive(Debug)]
pub enum Command {
    /// A new upstream read request
    Submit(UpstreamRequest),
    /// A transport read finished
    TransportComplete(TransportCompletion),
    /// The recovery timer armed with the given generation expired
    RecoveryTimerFired(TimerGeneration),
    /// Deferred reissue of a transport read
    DeferredReissue,
    IsConfigured(mpsc::Sender<bool>),
    Stop,
}
