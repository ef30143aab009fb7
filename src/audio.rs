//! Fixed-size audio slices handed from the microphone task to the
//! inference task.
//!
//! A single-producer / single-consumer channel with room for exactly one
//! finished slice. The producer fills a slice in place; when it completes
//! and the consumer still hasn't taken the previous one, the new slice is
//! dropped and the consumer's next receive reports [`AudioError::Overrun`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AudioError {
    #[error("sample buffer overrun; inference is slower than sampling")]
    Overrun,
    #[error("audio slice channel disconnected")]
    Disconnected,
    #[error("cannot allocate {0} samples for audio buffers")]
    Alloc(usize),
}

fn alloc_slice(len: usize) -> Result<Vec<i16>, AudioError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| AudioError::Alloc(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Buffers in flight: one being filled, one queued, one being classified.
const BUFFER_COUNT: usize = 3;

/// Create a slice channel. All working buffers are allocated up front;
/// failing to get them is fatal for the caller.
pub fn slice_channel(slice_len: usize) -> Result<(SliceProducer, SliceConsumer), AudioError> {
    let (tx, rx) = mpsc::sync_channel(1);
    let (recycle_tx, recycle_rx) = mpsc::channel();
    let overrun = Arc::new(AtomicBool::new(false));

    let mut spare = Vec::with_capacity(BUFFER_COUNT - 1);
    for _ in 1..BUFFER_COUNT {
        spare.push(alloc_slice(slice_len)?);
    }

    let producer = SliceProducer {
        current: alloc_slice(slice_len)?,
        filled: 0,
        spare,
        tx,
        recycle: recycle_rx,
        overrun: Arc::clone(&overrun),
    };
    let consumer = SliceConsumer {
        rx,
        recycle: recycle_tx,
        overrun,
        held: None,
    };
    Ok((producer, consumer))
}

pub struct SliceProducer {
    current: Vec<i16>,
    filled: usize,
    spare: Vec<Vec<i16>>,
    tx: SyncSender<Vec<i16>>,
    recycle: Receiver<Vec<i16>>,
    overrun: Arc<AtomicBool>,
}

impl SliceProducer {
    pub fn slice_len(&self) -> usize {
        self.current.len()
    }

    /// Append samples; returns how many slices were completed (including
    /// any dropped by an overrun).
    pub fn push(&mut self, mut samples: &[i16]) -> Result<usize, AudioError> {
        let mut completed = 0;
        while !samples.is_empty() {
            let room = self.current.len() - self.filled;
            let take = room.min(samples.len());
            self.current[self.filled..self.filled + take].copy_from_slice(&samples[..take]);
            self.filled += take;
            samples = &samples[take..];

            if self.filled == self.current.len() {
                self.flip()?;
                completed += 1;
            }
        }
        Ok(completed)
    }

    fn flip(&mut self) -> Result<(), AudioError> {
        self.filled = 0;
        while let Ok(buf) = self.recycle.try_recv() {
            self.spare.push(buf);
        }

        let Some(next) = self.spare.pop() else {
            self.overrun.store(true, Ordering::Release);
            return Ok(());
        };

        let full = std::mem::replace(&mut self.current, next);
        match self.tx.try_send(full) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(full)) => {
                // Previous slice not taken yet: drop this one and refill it.
                self.overrun.store(true, Ordering::Release);
                let next = std::mem::replace(&mut self.current, full);
                self.spare.push(next);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(AudioError::Disconnected),
        }
    }
}

pub struct SliceConsumer {
    rx: Receiver<Vec<i16>>,
    recycle: mpsc::Sender<Vec<i16>>,
    overrun: Arc<AtomicBool>,
    held: Option<Vec<i16>>,
}

impl SliceConsumer {
    /// Block until the next slice is ready.
    ///
    /// The previously returned slice goes back to the producer first. If the
    /// producer overran since the last call, the queued slice is still taken
    /// (keeping the buffers in step) but `Overrun` is returned and the caller
    /// should skip this cycle.
    pub fn recv(&mut self) -> Result<&[i16], AudioError> {
        if let Some(buf) = self.held.take() {
            // The producer may be gone; queued slices are still delivered.
            let _ = self.recycle.send(buf);
        }

        let slice = self.rx.recv().map_err(|_| AudioError::Disconnected)?;
        let overran = self.overrun.swap(false, Ordering::AcqRel);
        let slice: &[i16] = self.held.insert(slice);
        if overran {
            Err(AudioError::Overrun)
        } else {
            Ok(slice)
        }
    }
}
