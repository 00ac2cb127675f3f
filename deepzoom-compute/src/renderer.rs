//! Cooperative cancellation token shared by the coordinator and every
//! rayon-dispatched worker closure (§5: "Suspension points").
//!
//! Generalizes the teacher's `RenderCancel`: same atomic generation +
//! progress counters, now also consulted by the supersampling pass and the
//! glitch-correction loop, not just the tile-dispatch loop.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Tracks the current render generation for cancellation and progress.
///
/// Incrementing the generation signals all in-flight tiles to stop early.
/// The progress counters let a caller display a progress bar without
/// polling the coordinator directly.
#[derive(Debug)]
pub struct RenderCancel {
    generation: AtomicU64,
    progress_done: AtomicUsize,
    progress_total: AtomicUsize,
}

impl RenderCancel {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            progress_done: AtomicUsize::new(0),
            progress_total: AtomicUsize::new(0),
        }
    }

    /// Cancel the current render by advancing the generation.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Read the current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// `true` once `cancel()` has been called for this handle's current
    /// generation — a convenience over comparing a captured generation.
    pub fn is_cancelled(&self, captured_generation: u64) -> bool {
        self.generation() != captured_generation
    }

    /// Reset progress for a new phase with `total` work units.
    pub fn reset_progress(&self, total: usize) {
        self.progress_total.store(total, Ordering::Relaxed);
        self.progress_done.store(0, Ordering::Relaxed);
    }

    /// Increment completed work units by one.
    pub fn inc_progress(&self) {
        self.progress_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current progress as `(done, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.progress_done.load(Ordering::Relaxed),
            self.progress_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for RenderCancel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_advances_generation() {
        let cancel = RenderCancel::new();
        let gen = cancel.generation();
        cancel.cancel();
        assert_ne!(cancel.generation(), gen);
        assert!(cancel.is_cancelled(gen));
    }

    #[test]
    fn progress_tracks_done_and_total() {
        let cancel = RenderCancel::new();
        cancel.reset_progress(10);
        for _ in 0..3 {
            cancel.inc_progress();
        }
        assert_eq!(cancel.progress(), (3, 10));
    }
}
