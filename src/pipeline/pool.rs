use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;

/// Possible errors when taking a buffer from the pool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("all {0} transport buffers are in use")]
    Exhausted(usize),
    #[error("buffer pool state is poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
struct PoolState {
    free: Vec<Vec<u8>>,
    outstanding: usize,
}

/// Lookaside list of fixed-size transport buffers. Buffers return to the pool
/// when the [PooledBuffer] holding them is dropped.
#[derive(Debug, Clone)]
pub struct BufferPool {
    buffer_size: usize,
    capacity: usize,
    state: Arc<Mutex<PoolState>>,
}

impl BufferPool {
    pub fn new(buffer_size: usize, capacity: usize) -> Self {
        Self {
            buffer_size,
            capacity,
            state: Arc::new(Mutex::new(PoolState::default())),
        }
    }

    /// Take a zeroed buffer from the pool
    pub fn acquire(&self) -> Result<PooledBuffer, PoolError> {
        let mut state = self.state.lock().map_err(|_| PoolError::Poisoned)?;
        if state.outstanding >= self.capacity {
            return Err(PoolError::Exhausted(self.capacity));
        }
        let data = state
            .free
            .pop()
            .unwrap_or_else(|| vec![0; self.buffer_size]);
        state.outstanding += 1;

        Ok(PooledBuffer {
            data,
            pool: Arc::downgrade(&self.state),
        })
    }

    /// Number of buffers currently handed out
    pub fn outstanding(&self) -> usize {
        self.state.lock().map(|s| s.outstanding).unwrap_or(0)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A buffer on loan from a [BufferPool]
#[derive(Debug)]
pub struct PooledBuffer {
    data: Vec<u8>,
    pool: Weak<Mutex<PoolState>>,
}

impl PooledBuffer {
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.data.as_mut_slice()
    }

    /// The first `length` bytes of the buffer, as written by the transport
    pub fn filled(&self, length: usize) -> &[u8] {
        &self.data[..length.min(self.data.len())]
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut data = std::mem::take(&mut self.data);
        let Some(state) = self.pool.upgrade() else {
            return;
        };
        let Ok(mut state) = state.lock() else {
            log::warn!("Unable to return transport buffer to a poisoned pool");
            return;
        };
        data.fill(0);
        state.free.push(data);
        state.outstanding = state.outstanding.saturating_sub(1);
    }
}
