//! Cancellation tokens and the per-session read slot.
//!
//! Each read gets a token stamped with a fresh generation. The slot holds the
//! token of the one outstanding read; releasing or advancing the slot only
//! succeeds for the matching generation, so a late completion from an older
//! read can never clear or cancel a newer one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared flag polled by an in-flight transmission.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    generation: u64,
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Identifier of the read this token belongs to.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// Lifecycle position of a session's current read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// No read outstanding.
    Idle,
    /// Phase 1: the source query is filling the buffer.
    Reading,
    /// Phase 2: the buffer is being transmitted.
    Streaming,
}

#[derive(Debug)]
struct ActiveRead {
    token: CancellationToken,
    state: ReadState,
}

/// Holds at most one outstanding read per session.
#[derive(Debug, Default)]
pub struct ReadSlot {
    active: Mutex<Option<ActiveRead>>,
    next_generation: AtomicU64,
}

impl ReadSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveRead>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the slot for a new read and returns its token, or `None` when
    /// a read is already outstanding.
    pub fn begin(&self) -> Option<CancellationToken> {
        let mut active = self.lock();
        if active.is_some() {
            return None;
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new(generation);
        *active = Some(ActiveRead {
            token: token.clone(),
            state: ReadState::Reading,
        });
        Some(token)
    }

    /// Moves the read owning `token` from reading to streaming.
    pub fn advance(&self, token: &CancellationToken) -> bool {
        let mut active = self.lock();
        match active.as_mut() {
            Some(read) if read.token.generation == token.generation => {
                read.state = ReadState::Streaming;
                true
            }
            _ => false,
        }
    }

    /// Frees the slot if it still belongs to `token`.
    pub fn release(&self, token: &CancellationToken) -> bool {
        let mut active = self.lock();
        match active.as_ref() {
            Some(read) if read.token.generation == token.generation => {
                *active = None;
                true
            }
            _ => false,
        }
    }

    /// Marks the outstanding read for cancellation.
    ///
    /// Returns `false` when no read is outstanding.
    pub fn cancel(&self) -> bool {
        let active = self.lock();
        match active.as_ref() {
            Some(read) => {
                read.token.cancel();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ReadState {
        self.lock()
            .as_ref()
            .map_or(ReadState::Idle, |read| read.state)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }
}
