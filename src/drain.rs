//! Time-sliced draining of a text buffer to an output sink.
//!
//! `Idle → Draining → Idle`. Each [`Drainer::step`] emits at most one chunk
//! and returns, so a cooperative scheduler gets control back between chunks.

use crate::config::DRAIN_CHUNK_SIZE;

/// Destination for drained text (serial console, log, radio...).
pub trait Sink {
    /// Emit one chunk. Chunks arrive in order and are never split further.
    fn emit(&mut self, chunk: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Idle,
    /// Next chunk starts at `offset` bytes into the print buffer.
    Draining { offset: usize },
}

/// Outcome of one drain step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More text remains; schedule another step.
    More,
    /// The buffer has been emitted completely.
    Done,
}

pub struct Drainer<const CHUNK: usize = DRAIN_CHUNK_SIZE> {
    state: DrainState,
}

impl<const CHUNK: usize> Drainer<CHUNK> {
    const CHECK: () = assert!(CHUNK >= 4, "drain chunk must hold any UTF-8 character");

    pub const fn new() -> Self {
        let () = Self::CHECK;
        Self {
            state: DrainState::Idle,
        }
    }

    pub fn state(&self) -> DrainState {
        self.state
    }

    pub fn is_draining(&self) -> bool {
        matches!(self.state, DrainState::Draining { .. })
    }

    /// Start draining a buffer from its beginning.
    pub fn begin(&mut self) {
        self.state = DrainState::Draining { offset: 0 };
    }

    /// Emit the next chunk of `text`.
    ///
    /// `text` must be the same buffer for every step of one drain. Chunks
    /// are cut on character boundaries, so ASCII text of `S` bytes takes
    /// exactly `ceil(S / CHUNK)` steps. Empty text completes without
    /// emitting.
    pub fn step<S: Sink + ?Sized>(&mut self, text: &str, sink: &mut S) -> Step {
        let DrainState::Draining { offset } = self.state else {
            return Step::Done;
        };

        if offset >= text.len() {
            self.state = DrainState::Idle;
            return Step::Done;
        }

        let end = chunk_end(text, offset, CHUNK);
        sink.emit(&text[offset..end]);

        if end >= text.len() {
            self.state = DrainState::Idle;
            Step::Done
        } else {
            self.state = DrainState::Draining { offset: end };
            Step::More
        }
    }
}

impl<const CHUNK: usize> Default for Drainer<CHUNK> {
    fn default() -> Self {
        Self::new()
    }
}

/// End of the chunk starting at `start`, backed off to a char boundary.
fn chunk_end(text: &str, start: usize, chunk: usize) -> usize {
    let mut end = (start + chunk).min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}
