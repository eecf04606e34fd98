//! The decode → accumulate → drain pipeline.
//!
//! [`Observer`] owns the buffer pool, the drain state machine and the single
//! outstanding rotation timer. It is driven entirely by three callbacks,
//! all expected on one thread:
//!
//! - [`Observer::on_advertisement`] for every received advertisement,
//! - [`Observer::run`] with [`Task::Rotate`] when the rotation timer fires,
//! - [`Observer::run`] with [`Task::Drain`] for each drain tick.
//!
//! At any time exactly one rotation intent is outstanding: either the
//! periodic timer is armed (idle) or a drain is in progress, and the drain
//! re-arms the timer when it finishes.

use serde::Serialize;

use crate::config::{
    DRAIN_CHUNK_SIZE, NR_URI_BUFFERS, ROTATE_DELAY_MS, URI_BUFFER_SIZE, URI_BUFFER_THRESHOLD,
};
use crate::decoder::decode_url;
use crate::drain::{DrainState, Drainer, Sink, Step};
use crate::error::Error;
use crate::frame::extract_url_frame;
use crate::pool::BufferPool;
use crate::sched::{Scheduler, Task, TimerHandle};

/// The observer the firmware runs with.
pub type UriObserver = Observer<NR_URI_BUFFERS, URI_BUFFER_SIZE, DRAIN_CHUNK_SIZE>;

/// Running counters, reported in the periodic status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ObserverStats {
    /// Advertisements handed to the observer
    pub adverts: u32,
    /// Advertisements carrying an Eddystone-URL frame
    pub url_frames: u32,
    /// URIs written to a buffer
    pub stored: u32,
    /// URIs dropped as already present in the fill buffer
    pub duplicates: u32,
    pub malformed: u32,
    pub encoding_errors: u32,
    /// All rotations, periodic and capacity-triggered
    pub rotations: u32,
    pub capacity_rotations: u32,
    pub buffers_drained: u32,
}

/// What became of one advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// No Eddystone-URL frame in the payload.
    Ignored,
    /// Payload failed bounds checks.
    Malformed,
    /// URL frame could not be expanded.
    Undecodable,
    /// Already present in the fill buffer.
    Duplicate,
    Stored,
}

pub struct Observer<const N: usize, const CAP: usize, const CHUNK: usize> {
    pool: BufferPool<N, CAP>,
    drainer: Drainer<CHUNK>,
    rotate_timer: Option<TimerHandle>,
    rotate_delay_ms: u32,
    stats: ObserverStats,
}

impl<const N: usize, const CAP: usize, const CHUNK: usize> Observer<N, CAP, CHUNK> {
    pub const fn new(threshold: usize, rotate_delay_ms: u32) -> Self {
        Self {
            pool: BufferPool::new(threshold),
            drainer: Drainer::new(),
            rotate_timer: None,
            rotate_delay_ms,
            stats: ObserverStats {
                adverts: 0,
                url_frames: 0,
                stored: 0,
                duplicates: 0,
                malformed: 0,
                encoding_errors: 0,
                rotations: 0,
                capacity_rotations: 0,
                buffers_drained: 0,
            },
        }
    }

    pub fn pool(&self) -> &BufferPool<N, CAP> {
        &self.pool
    }

    pub fn stats(&self) -> &ObserverStats {
        &self.stats
    }

    pub fn drain_state(&self) -> DrainState {
        self.drainer.state()
    }

    /// Whether the periodic rotation timer is armed.
    pub fn rotation_pending(&self) -> bool {
        self.rotate_timer.is_some()
    }

    /// Arm the first periodic rotation.
    pub fn start<S: Scheduler + ?Sized>(&mut self, sched: &mut S) {
        if self.rotate_timer.is_none() && !self.drainer.is_draining() {
            self.arm_rotation(sched);
        }
    }

    /// Handle one received advertisement.
    ///
    /// Malformed payloads and undecodable URLs are counted, logged, and
    /// dropped. The only error returned is [`Error::PoolExhausted`], raised
    /// when a capacity-triggered rotation finds no free buffer.
    pub fn on_advertisement<S: Scheduler + ?Sized>(
        &mut self,
        payload: &[u8],
        rssi: i8,
        sched: &mut S,
    ) -> Result<Sighting, Error> {
        self.stats.adverts = self.stats.adverts.wrapping_add(1);

        let frame = match extract_url_frame(payload) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(Sighting::Ignored),
            Err(e) => {
                self.stats.malformed = self.stats.malformed.wrapping_add(1);
                log::debug!("Dropping advertisement: {}", e);
                return Ok(Sighting::Malformed);
            }
        };
        self.stats.url_frames = self.stats.url_frames.wrapping_add(1);

        let uri = match decode_url(frame.url, rssi) {
            Ok(uri) => uri,
            Err(e) => {
                self.stats.encoding_errors = self.stats.encoding_errors.wrapping_add(1);
                log::warn!("{}", e);
                return Ok(Sighting::Undecodable);
            }
        };

        let appended = match self.pool.append(&uri) {
            Ok(appended) => appended,
            Err(e) if e.is_fatal() => {
                log::error!("{}", e);
                return Err(e);
            }
            Err(e) => {
                self.stats.encoding_errors = self.stats.encoding_errors.wrapping_add(1);
                log::warn!("{}", e);
                return Ok(Sighting::Undecodable);
            }
        };

        if appended.rotated {
            self.stats.capacity_rotations = self.stats.capacity_rotations.wrapping_add(1);
            log::debug!("Fill buffer near capacity, flushing early");
            self.after_rotation(sched);
        }

        if appended.duplicate {
            self.stats.duplicates = self.stats.duplicates.wrapping_add(1);
            Ok(Sighting::Duplicate)
        } else {
            self.stats.stored = self.stats.stored.wrapping_add(1);
            Ok(Sighting::Stored)
        }
    }

    /// Run a scheduled task.
    ///
    /// Returns [`Error::PoolExhausted`] if a periodic rotation finds no free
    /// buffer; the caller must halt.
    pub fn run<S, K>(&mut self, task: Task, sched: &mut S, sink: &mut K) -> Result<(), Error>
    where
        S: Scheduler + ?Sized,
        K: Sink + ?Sized,
    {
        match task {
            Task::Rotate => self.on_rotate_timer(sched),
            Task::Drain => {
                self.on_drain_tick(sched, sink);
                Ok(())
            }
        }
    }

    fn on_rotate_timer<S: Scheduler + ?Sized>(&mut self, sched: &mut S) -> Result<(), Error> {
        // A capacity rotation already consumed this intent.
        if self.rotate_timer.take().is_none() {
            log::debug!("Ignoring stale rotation timer");
            return Ok(());
        }
        if let Err(e) = self.pool.rotate() {
            log::error!("{}", e);
            return Err(e);
        }
        self.after_rotation(sched);
        Ok(())
    }

    /// Bookkeeping shared by periodic and capacity-triggered rotation.
    fn after_rotation<S: Scheduler + ?Sized>(&mut self, sched: &mut S) {
        self.stats.rotations = self.stats.rotations.wrapping_add(1);
        log::debug!(
            "Rotated: fill={} print={}",
            self.pool.fill_index(),
            self.pool.print_index()
        );

        if let Some(handle) = self.rotate_timer.take() {
            sched.cancel(handle);
        }

        // An active drain picks up the backlog when it finishes.
        if !self.drainer.is_draining() {
            self.begin_drain(sched);
        }
    }

    fn on_drain_tick<S, K>(&mut self, sched: &mut S, sink: &mut K)
    where
        S: Scheduler + ?Sized,
        K: Sink + ?Sized,
    {
        if !self.drainer.is_draining() {
            return;
        }

        match self.drainer.step(self.pool.print_buffer(), sink) {
            Step::More => sched.post(Task::Drain),
            Step::Done => {
                self.pool.finish_print();
                self.stats.buffers_drained = self.stats.buffers_drained.wrapping_add(1);

                if self.pool.has_backlog() {
                    self.begin_drain(sched);
                } else {
                    self.arm_rotation(sched);
                }
            }
        }
    }

    fn begin_drain<S: Scheduler + ?Sized>(&mut self, sched: &mut S) {
        self.drainer.begin();
        sched.post(Task::Drain);
    }

    fn arm_rotation<S: Scheduler + ?Sized>(&mut self, sched: &mut S) {
        if let Some(handle) = self.rotate_timer.take() {
            sched.cancel(handle);
        }
        self.rotate_timer = Some(sched.post_after(self.rotate_delay_ms, Task::Rotate));
    }
}

impl Default for UriObserver {
    fn default() -> Self {
        Self::new(URI_BUFFER_THRESHOLD, ROTATE_DELAY_MS)
    }
}
