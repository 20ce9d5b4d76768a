pub mod hidraw;

use hidapi::HidError;
use thiserror::Error;

use crate::drivers::apple_trackpad::parser::PacketProtocol;

use super::{exchange::CompletionSink, pool::PooledBuffer};

/// Possible errors from a transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport is not ready")]
    NotReady,
    #[error("device disconnected")]
    Disconnected,
    #[error("hid error: {0}")]
    Hid(#[from] HidError),
    #[error("{0}")]
    Other(String),
}

/// Downstream source of raw trackpad packets. A coordinator drives exactly
/// one transport and never has more than one read outstanding on it.
pub trait Transport: Send + 'static {
    /// Per-read request object, created before a buffer is taken from the
    /// pool
    type Request: Send + 'static;

    /// Packet layout delivered by this transport
    fn protocol(&self) -> PacketProtocol;

    /// Vendor ID of the device behind this transport
    fn vendor_id(&self) -> u16;

    fn create_request(&mut self) -> Result<Self::Request, TransportError>;

    /// Bind the buffer to the request before it is sent. A failure here is
    /// not retried locally.
    fn format_request(
        &mut self,
        request: &mut Self::Request,
        buffer: &mut PooledBuffer,
    ) -> Result<(), TransportError>;

    /// Start an asynchronous read into the given buffer. The result must be
    /// delivered through the sink. If an error is returned the read was never
    /// started and the request and buffer have been released.
    fn send_read(
        &mut self,
        request: Self::Request,
        buffer: PooledBuffer,
        sink: CompletionSink,
    ) -> Result<(), TransportError>;

    /// Put the device back into multitouch reporting mode
    fn reconfigure(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
