//! Rotating pool of fixed-capacity URI text buffers.
//!
//! One buffer is the fill target (decoded URIs are appended to it), one is
//! the print source (the drainer reads it). Buffers between the print index
//! and the fill index are full and waiting to be drained.
//!
//! ```text
//!   print            fill
//!     v                v
//!   [ B0 ] [ B1 ] [ B2 ] [ B3 ]
//!   drain   queued  filling  free
//! ```
//!
//! Advancing the fill index onto the print index would overwrite text that
//! has not been printed yet, so [`BufferPool::rotate`] refuses with
//! [`Error::PoolExhausted`].

use heapless::String;

use crate::config::{NR_URI_BUFFERS, URI_BUFFER_SIZE, URI_BUFFER_THRESHOLD};
use crate::error::{EncodingError, Error};

/// The pool the firmware runs with.
pub type UriPool = BufferPool<NR_URI_BUFFERS, URI_BUFFER_SIZE>;

/// A text buffer that rejects writes past its capacity.
pub struct TextBuffer<const CAP: usize> {
    content: String<CAP>,
}

impl<const CAP: usize> TextBuffer<CAP> {
    pub const fn new() -> Self {
        Self {
            content: String::new(),
        }
    }

    pub const fn capacity(&self) -> usize {
        CAP
    }

    /// Characters written so far (bytes; ASCII in practice).
    pub fn write_position(&self) -> usize {
        self.content.len()
    }

    pub fn as_str(&self) -> &str {
        self.content.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.content.contains(needle)
    }

    /// Append `text` whole, or leave the buffer untouched.
    pub fn push(&mut self, text: &str) -> Result<(), EncodingError> {
        self.content.push_str(text).map_err(|_| EncodingError::Overflow)
    }

    pub fn clear(&mut self) {
        self.content.clear();
    }
}

impl<const CAP: usize> Default for TextBuffer<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a successful [`BufferPool::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    /// The capacity guard rotated the pool before writing.
    pub rotated: bool,
    /// The URI was already in the fill buffer and was not written again.
    pub duplicate: bool,
}

pub struct BufferPool<const N: usize, const CAP: usize> {
    buffers: [TextBuffer<CAP>; N],
    fill: usize,
    print: usize,
    threshold: usize,
}

impl<const N: usize, const CAP: usize> BufferPool<N, CAP> {
    const CHECK: () = assert!(N >= 2, "a buffer pool needs at least two buffers");

    /// Create an empty pool. Rotation is forced once fewer than `threshold`
    /// characters remain in the fill buffer.
    pub const fn new(threshold: usize) -> Self {
        let () = Self::CHECK;
        Self {
            buffers: [const { TextBuffer::new() }; N],
            fill: 0,
            print: 0,
            threshold,
        }
    }

    pub fn fill_index(&self) -> usize {
        self.fill
    }

    pub fn print_index(&self) -> usize {
        self.print
    }

    pub fn fill_buffer(&self) -> &TextBuffer<CAP> {
        &self.buffers[self.fill]
    }

    /// Text of the buffer currently being printed.
    pub fn print_buffer(&self) -> &str {
        self.buffers[self.print].as_str()
    }

    /// Whether full buffers are waiting between the print and fill indices.
    pub fn has_backlog(&self) -> bool {
        self.print != self.fill
    }

    /// Capacity guard: the fill buffer is within `threshold` of its end.
    pub fn needs_rotation(&self) -> bool {
        self.fill_buffer().write_position() + self.threshold >= CAP
    }

    /// Move the fill target to the next slot and reset it.
    ///
    /// Fails without touching any buffer if the next slot is still being
    /// printed.
    pub fn rotate(&mut self) -> Result<(), Error> {
        let next = (self.fill + 1) % N;
        if next == self.print {
            return Err(Error::PoolExhausted {
                fill: next,
                print: self.print,
            });
        }
        self.buffers[next].clear();
        self.fill = next;
        Ok(())
    }

    /// Mark the print buffer as fully drained and move to the next one.
    ///
    /// No-op when the print index has caught up with the fill index; the
    /// buffer being filled is never handed to the drainer.
    pub fn finish_print(&mut self) {
        if self.has_backlog() {
            self.print = (self.print + 1) % N;
        }
    }

    /// Append a decoded URI to the fill buffer.
    ///
    /// Rotates first if the capacity guard trips. A URI already present in
    /// the fill buffer is dropped.
    pub fn append(&mut self, uri: &str) -> Result<Appended, Error> {
        let rotated = self.needs_rotation();
        if rotated {
            self.rotate()?;
        }

        let fill = &mut self.buffers[self.fill];
        if fill.contains(uri) {
            return Ok(Appended {
                rotated,
                duplicate: true,
            });
        }

        fill.push(uri)?;
        Ok(Appended {
            rotated,
            duplicate: false,
        })
    }
}

impl Default for UriPool {
    fn default() -> Self {
        Self::new(URI_BUFFER_THRESHOLD)
    }
}
