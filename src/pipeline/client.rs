use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{
    self,
    error::{SendError, SendTimeoutError},
    Sender,
};

use super::{
    command::Command,
    queue::{Completion, UpstreamRequest},
};

/// Maximum duration to wait for the coordinator to accept a command. If this
/// timeout is reached, that typically indicates a deadlock somewhere in the
/// code.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Possible errors for a coordinator client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to send command to coordinator: {0}")]
    SendError(SendError<Command>),
    #[error("coordinator encountered an error processing the request: {0}")]
    ServiceError(String),
    #[error("coordinator no longer exists")]
    ChannelClosed,
}

impl From<SendError<Command>> for ClientError {
    fn from(err: SendError<Command>) -> Self {
        Self::SendError(err)
    }
}

/// A client for a running [super::coordinator::Coordinator]
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    tx: Sender<Command>,
}

impl From<Sender<Command>> for CoordinatorClient {
    fn from(tx: Sender<Command>) -> Self {
        CoordinatorClient::new(tx)
    }
}

impl CoordinatorClient {
    pub fn new(tx: Sender<Command>) -> Self {
        Self { tx }
    }

    /// Send the given command to the coordinator. This method uses a timeout
    /// to detect potential deadlocks.
    async fn send(&self, cmd: Command) -> Result<(), ClientError> {
        let result = self.tx.send_timeout(cmd, DEFAULT_TIMEOUT).await;
        let Err(err) = result else {
            return Ok(());
        };
        match err {
            SendTimeoutError::Timeout(ref cmd) => {
                log::error!("POSSIBLE DEADLOCK: timed out after {DEFAULT_TIMEOUT:?} sending command to coordinator: {cmd:?}");
                Err(ClientError::ServiceError(err.to_string()))
            }
            SendTimeoutError::Closed(_) => Err(ClientError::ChannelClosed),
        }
    }

    /// Submit an upstream request. The completion is delivered on the
    /// receiver returned by [UpstreamRequest::new].
    pub async fn submit(&self, request: UpstreamRequest) -> Result<(), ClientError> {
        self.send(Command::Submit(request)).await
    }

    /// Submit a request with a buffer of the given size and wait until it
    /// is completed. Waits as long as it takes for the device to produce a
    /// report.
    pub async fn read_report(&self, buffer_size: usize) -> Result<Completion, ClientError> {
        let (request, mut rx) = UpstreamRequest::new(vec![0; buffer_size]);
        self.submit(request).await?;
        rx.recv().await.ok_or(ClientError::ChannelClosed)
    }

    /// Returns whether the device is currently configured
    pub async fn is_configured(&self) -> Result<bool, ClientError> {
        let (tx, mut rx) = mpsc::channel(1);
        self.send(Command::IsConfigured(tx)).await?;
        match tokio::time::timeout(DEFAULT_TIMEOUT, rx.recv()).await {
            Ok(Some(configured)) => Ok(configured),
            Ok(None) => Err(ClientError::ChannelClosed),
            Err(_) => {
                log::error!("POSSIBLE DEADLOCK: timed out after {DEFAULT_TIMEOUT:?} waiting for response from coordinator");
                Err(ClientError::ChannelClosed)
            }
        }
    }

    /// Stop the coordinator
    pub async fn stop(&self) -> Result<(), ClientError> {
        self.send(Command::Stop).await
    }
}
