use std::collections::VecDeque;

use thiserror::Error;
use tokio::sync::mpsc;

/// Completion status of an upstream request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// The device delivered data that could not be turned into a report
    DeviceDataError,
    /// The request could not be queued
    Rejected,
}

/// Result handed back to the submitter of an upstream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: Status,
    /// Number of bytes written into the buffer
    pub information: usize,
    pub buffer: Vec<u8>,
}

impl Completion {
    /// The written report, if the request succeeded
    pub fn report(&self) -> Option<&[u8]> {
        if self.status != Status::Success {
            return None;
        }
        self.buffer.get(..self.information)
    }
}

/// A read request from the host input stack awaiting a report. Dropping the
/// receiver returned by [UpstreamRequest::new] cancels the request.
#[derive(Debug)]
pub struct UpstreamRequest {
    buffer: Vec<u8>,
    reply: mpsc::Sender<Completion>,
}

impl UpstreamRequest {
    pub fn new(buffer: Vec<u8>) -> (Self, mpsc::Receiver<Completion>) {
        let (reply, rx) = mpsc::channel(1);
        (Self { buffer, reply }, rx)
    }

    pub fn is_cancelled(&self) -> bool {
        self.reply.is_closed()
    }

    /// Complete the request with the given status and result length
    pub fn complete(self, status: Status, information: usize) {
        let Self { buffer, reply } = self;
        let completion = Completion {
            status,
            information,
            buffer,
        };
        if let Err(e) = reply.try_send(completion) {
            log::debug!("Upstream request went away before completion: {e:?}");
        }
    }

    /// Copy the packed report into the request buffer and complete it
    pub fn complete_with_report(mut self, report: &[u8]) {
        if self.buffer.len() < report.len() {
            log::warn!(
                "Upstream buffer too small for report: {} < {}",
                self.buffer.len(),
                report.len()
            );
            self.complete(Status::DeviceDataError, 0);
            return;
        }
        self.buffer[..report.len()].copy_from_slice(report);
        self.complete(Status::Success, report.len());
    }
}

/// Possible errors when queueing an upstream request
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("request queue is full")]
    Full(UpstreamRequest),
}

/// FIFO of upstream requests waiting for a report
#[derive(Debug)]
pub struct RequestQueue {
    requests: VecDeque<UpstreamRequest>,
    capacity: usize,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            requests: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, request: UpstreamRequest) -> Result<(), QueueError> {
        if self.requests.len() >= self.capacity {
            self.prune();
        }
        if self.requests.len() >= self.capacity {
            return Err(QueueError::Full(request));
        }
        self.requests.push_back(request);
        Ok(())
    }

    /// Remove and return the oldest request that has not been cancelled
    pub fn pop(&mut self) -> Option<UpstreamRequest> {
        while let Some(request) = self.requests.pop_front() {
            if request.is_cancelled() {
                log::debug!("Skipping cancelled upstream request");
                continue;
            }
            return Some(request);
        }
        None
    }

    /// Whether any live request is waiting
    pub fn has_waiting(&mut self) -> bool {
        self.prune();
        !self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn prune(&mut self) {
        self.requests.retain(|request| !request.is_cancelled());
    }
}
