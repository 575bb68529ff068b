//! Speaker output. Plucks play sample by sample on their own task so the
//! engine loop never waits on audio.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chime_common::{Note, Pluck};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

/// Plucks allowed to wait behind the one being played. A melody note takes
/// about as long as a tick, so anything past this is dropped instead of
/// building a backlog.
pub const TONE_QUEUE_DEPTH: usize = 2;

pub trait ToneSink: Send + 'static {
    fn sample(&mut self, note: Note, volume: u8, sample_ms: u32);
}

/// Host stand-in for the speaker: every sample becomes a trace event.
pub struct TraceSink;

impl ToneSink for TraceSink {
    fn sample(&mut self, note: Note, volume: u8, sample_ms: u32) {
        trace!(?note, hz = note.frequency_hz(), volume, sample_ms, "play sample");
    }
}

/// Handle to the tone task.
///
/// Each queued pluck carries the generation it was queued in. `silence`
/// bumps the generation, which stops the current pluck at its next sample
/// and makes the task skip everything still queued.
#[derive(Clone)]
pub struct ToneOutput {
    queue: mpsc::Sender<(u64, Pluck)>,
    generation: Arc<AtomicU64>,
}

impl ToneOutput {
    pub fn spawn<S: ToneSink>(mut sink: S) -> Self {
        let (queue, mut pending) = mpsc::channel::<(u64, Pluck)>(TONE_QUEUE_DEPTH);
        let generation = Arc::new(AtomicU64::new(0));
        let current = generation.clone();

        tokio::spawn(async move {
            while let Some((queued_in, pluck)) = pending.recv().await {
                if queued_in != current.load(Ordering::Acquire) {
                    continue;
                }
                debug!(note = ?pluck.note, hz = pluck.note.frequency_hz(), "tone");
                for (volume, sample_ms) in pluck.samples() {
                    if queued_in != current.load(Ordering::Acquire) {
                        break;
                    }
                    sink.sample(pluck.note, volume, sample_ms);
                    tokio::time::sleep(Duration::from_millis(sample_ms.into())).await;
                }
            }
        });

        Self { queue, generation }
    }

    /// Queues a pluck behind the one playing. Returns false if it was
    /// dropped because the queue is full or the task is gone.
    pub fn play(&self, pluck: Pluck) -> bool {
        let generation = self.generation.load(Ordering::Acquire);
        match self.queue.try_send((generation, pluck)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(note = ?pluck.note, "tone queue full, dropping note");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(note = ?pluck.note, "tone output stopped, dropping note");
                false
            }
        }
    }

    pub fn silence(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
