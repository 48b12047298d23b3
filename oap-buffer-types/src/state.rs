use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
/// Lifecycle of a buffer.
///
/// ```ignore
/// Uninitialized -> Initializing -> Running -> ShuttingDown -> Closed
/// ```
///
/// A failed initialization returns to `Uninitialized`.
pub enum BufferState {
    Uninitialized = 0,
    Initializing = 1,
    Running = 2,
    ShuttingDown = 3,
    Closed = 4,
}

/// A [`BufferState`] shared between the owner of a buffer and its writer handles.
#[derive(Debug, Clone)]
pub struct SharedState {
    state: Arc<AtomicU8>,
}

impl BufferState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Running,
            3 => Self::ShuttingDown,
            _ => Self::Closed,
        }
    }
}

impl Display for BufferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(BufferState::Uninitialized as u8)),
        }
    }

    pub fn get(&self) -> BufferState {
        BufferState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`. Fails with the actual state if it is not `from`.
    pub fn transit(&self, from: BufferState, to: BufferState) -> Result<(), BufferState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(BufferState::from_u8)
    }

    pub fn is_running(&self) -> bool {
        self.get() == BufferState::Running
    }
}
