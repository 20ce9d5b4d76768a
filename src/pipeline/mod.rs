//! Request pipeline that turns upstream read requests into transport reads
//! and decoded multitouch reports.
//!
//! A single [coordinator::Coordinator] task owns the device context. Every
//! mutation (new upstream requests, transport completions, timer fires) is
//! delivered to it as a [command::Command], so at most one transport exchange
//! is ever in flight for a device.
pub mod client;
pub mod command;
pub mod coordinator;
pub mod exchange;
pub mod pool;
pub mod queue;
pub mod recovery;
pub mod transport;

#[cfg(test)]
pub mod queue_test;
