//! Speech output controller
//!
//! Owns all outgoing synthesized speech. A reply becomes a speech job: an
//! ordered list of chunks rendered one at a time on a blocking worker, with
//! stop and pause requests checked at every chunk boundary. Requests are
//! kept in an atomic so they can be raised from the dispatch loop while a
//! job is mid-sequence, without touching the engine lock.

mod chunking;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{Error, Result};

pub use chunking::{DEFAULT_CHUNK_BUDGET, chunk_for_speech};

/// How often a paused job re-checks the pause flag
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Synchronous voice synthesis engine
///
/// `speak_once` renders a whole string and cannot be interrupted part way,
/// which is why the controller chunks text before handing it over.
pub trait VoiceEngine: Send + Sync {
    /// Render `text` to the speakers, returning once playback is done
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    fn speak_once(&self, text: &str) -> Result<()>;

    /// Describe the installed voices, in engine order
    fn list_voices(&self) -> Vec<String>;

    /// Select the first voice whose description contains `needle`
    /// (case-insensitive), returning its description
    fn select_voice(&self, needle: &str) -> Option<String>;
}

const STOP: u8 = 0b01;
const PAUSE: u8 = 0b10;

/// Stop/pause request flags shared between the dispatch loop and speech jobs
///
/// Both requests live in one atomic so a job always sees a consistent pair.
#[derive(Debug, Default)]
pub struct SpeechFlags {
    state: AtomicU8,
}

impl SpeechFlags {
    /// Skip every chunk after the one currently rendering
    ///
    /// Also releases a paused job so that it observes the stop and aborts.
    pub fn request_stop(&self) {
        self.state.store(STOP, Ordering::SeqCst);
    }

    /// Hold the job at the next chunk boundary until [`Self::resume`]
    pub fn request_pause(&self) {
        self.state.store(STOP | PAUSE, Ordering::SeqCst);
    }

    /// Clear both requests
    pub fn resume(&self) {
        self.state.store(0, Ordering::SeqCst);
    }

    /// Whether a stop is pending
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::SeqCst) & STOP != 0
    }

    /// Whether a pause is pending
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.load(Ordering::SeqCst) & PAUSE != 0
    }

    fn snapshot(&self) -> u8 {
        self.state.load(Ordering::SeqCst)
    }

    fn clear_stop(&self) {
        self.state.fetch_and(!STOP, Ordering::SeqCst);
    }
}

/// FIFO ticket queue that lets jobs render in the order they were issued
#[derive(Debug, Default)]
struct Turns {
    issued: AtomicU64,
    serving: Mutex<u64>,
    advanced: Condvar,
}

impl Turns {
    fn take_ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst)
    }

    /// Block until `ticket` is served; the turn passes on when the guard drops
    fn wait_for(&self, ticket: u64) -> TurnGuard<'_> {
        let mut serving = self.serving.lock().unwrap_or_else(PoisonError::into_inner);
        while *serving != ticket {
            serving = self
                .advanced
                .wait(serving)
                .unwrap_or_else(PoisonError::into_inner);
        }
        TurnGuard { turns: self }
    }
}

struct TurnGuard<'a> {
    turns: &'a Turns,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut serving = self
            .turns
            .serving
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *serving += 1;
        self.turns.advanced.notify_all();
    }
}

/// How a speech job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every chunk was spoken
    Finished {
        /// Number of chunks spoken
        spoken: usize,
    },
    /// A stop request skipped the remaining chunks
    Aborted {
        /// Chunks spoken before the stop took effect
        spoken: usize,
        /// Chunks never spoken
        skipped: usize,
    },
    /// The engine failed; remaining chunks were dropped
    Failed {
        /// Chunks spoken before the failure
        spoken: usize,
        /// Engine error message
        error: String,
    },
}

/// Handle to a speech job running in the background
#[derive(Debug)]
pub struct SpeechJob {
    handle: JoinHandle<JobOutcome>,
}

impl SpeechJob {
    /// Wait for the job to end
    pub async fn wait(self) -> JobOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::Failed {
                spoken: 0,
                error: format!("speech worker failed: {e}"),
            },
        }
    }
}

/// Interruptible speech output
///
/// Cheap to clone; clones share the engine, its lock and the request flags.
#[derive(Clone)]
pub struct SpeechController {
    engine: Arc<dyn VoiceEngine>,
    engine_lock: Arc<Mutex<()>>,
    flags: Arc<SpeechFlags>,
    turns: Arc<Turns>,
    /// Jobs with a ticket below this were issued before the last stop
    stop_barrier: Arc<AtomicU64>,
    chunk_budget: usize,
}

impl SpeechController {
    /// Create a controller around a voice engine
    #[must_use]
    pub fn new(engine: Arc<dyn VoiceEngine>, chunk_budget: usize) -> Self {
        Self {
            engine,
            engine_lock: Arc::new(Mutex::new(())),
            flags: Arc::new(SpeechFlags::default()),
            turns: Arc::new(Turns::default()),
            stop_barrier: Arc::new(AtomicU64::new(0)),
            chunk_budget,
        }
    }

    /// Start speaking `text` as a chunked, interruptible job
    ///
    /// A stale stop request is cleared before the job is queued. A pending
    /// pause is kept, so the new job waits for [`Self::resume`]. Jobs start
    /// in the order `speak` was called; a job waits for every earlier job
    /// to end.
    ///
    /// Must be called from within a tokio runtime.
    pub fn speak(&self, text: &str) -> SpeechJob {
        self.flags.clear_stop();
        let chunks = chunk_for_speech(text, self.chunk_budget);
        let ticket = self.turns.take_ticket();
        tracing::debug!(chunks = chunks.len(), ticket, "speech job queued");

        let this = self.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _turn = this.turns.wait_for(ticket);
            this.render_chunks(ticket, &chunks)
        });
        SpeechJob { handle }
    }

    /// Speak `text` as a single chunk and wait for it to finish
    ///
    /// Ignores stop and pause requests. Used for short cues where
    /// interruption is not needed.
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails or the worker cannot be joined
    pub async fn speak_now(&self, text: &str) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        let lock = Arc::clone(&self.engine_lock);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            engine.speak_once(&text)
        })
        .await
        .map_err(|e| Error::Tts(format!("speech worker failed: {e}")))?
    }

    /// Render chunks in order on the calling thread, honouring requests
    /// between chunks
    fn render_chunks(&self, ticket: u64, chunks: &[String]) -> JobOutcome {
        let total = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            if self.abort_at_boundary(ticket) {
                tracing::debug!(spoken = index, skipped = total - index, "speech job stopped");
                return JobOutcome::Aborted {
                    spoken: index,
                    skipped: total - index,
                };
            }

            let _guard = self.engine_lock.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = self.engine.speak_once(chunk) {
                tracing::warn!(error = %e, chunk = index, "voice engine failed");
                return JobOutcome::Failed {
                    spoken: index,
                    error: e.to_string(),
                };
            }
        }

        JobOutcome::Finished { spoken: total }
    }

    /// Hold while paused, then report whether the job must abort
    fn abort_at_boundary(&self, ticket: u64) -> bool {
        let mut state = self.flags.snapshot();
        while state & PAUSE != 0 {
            std::thread::sleep(PAUSE_POLL_INTERVAL);
            state = self.flags.snapshot();
        }

        state & STOP != 0 || ticket < self.stop_barrier.load(Ordering::SeqCst)
    }

    /// Stop after the chunk currently rendering. Idempotent.
    ///
    /// Jobs already queued behind it are dropped too, even if a later
    /// [`Self::speak`] clears the flag before they get their turn.
    pub fn stop(&self) {
        self.flags.request_stop();
        self.stop_barrier
            .fetch_max(self.turns.issued.load(Ordering::SeqCst), Ordering::SeqCst);
        tracing::debug!("speech stop requested");
    }

    /// Pause at the next chunk boundary
    pub fn pause(&self) {
        self.flags.request_pause();
        tracing::debug!("speech pause requested");
    }

    /// Let a paused job continue with its remaining chunks
    pub fn resume(&self) {
        self.flags.resume();
        tracing::debug!("speech resumed");
    }

    /// Shared request flags
    #[must_use]
    pub fn flags(&self) -> Arc<SpeechFlags> {
        Arc::clone(&self.flags)
    }

    /// Describe the engine's installed voices
    #[must_use]
    pub fn list_voices(&self) -> Vec<String> {
        self.engine.list_voices()
    }

    /// Select a voice by description substring
    #[must_use]
    pub fn select_voice(&self, needle: &str) -> Option<String> {
        self.engine.select_voice(needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_start_clear() {
        let flags = SpeechFlags::default();
        assert!(!flags.is_stopped());
        assert!(!flags.is_paused());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let once = SpeechFlags::default();
        once.request_stop();

        let twice = SpeechFlags::default();
        twice.request_stop();
        twice.request_stop();

        assert_eq!(once.is_stopped(), twice.is_stopped());
        assert_eq!(once.is_paused(), twice.is_paused());
    }

    #[test]
    fn test_pause_sets_both_flags() {
        let flags = SpeechFlags::default();
        flags.request_pause();
        assert!(flags.is_paused());
        assert!(flags.is_stopped());
    }

    #[test]
    fn test_resume_clears_both_flags() {
        let flags = SpeechFlags::default();
        flags.request_pause();
        flags.resume();
        assert!(!flags.is_paused());
        assert!(!flags.is_stopped());
    }

    #[test]
    fn test_turns_are_served_in_ticket_order() {
        let turns = Arc::new(Turns::default());
        let first = turns.take_ticket();
        let second = turns.take_ticket();
        let order = Arc::new(Mutex::new(Vec::new()));

        let waiter = {
            let turns = Arc::clone(&turns);
            let order = Arc::clone(&order);
            std::thread::spawn(move || {
                let _turn = turns.wait_for(second);
                order.lock().unwrap().push(second);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        {
            let _turn = turns.wait_for(first);
            order.lock().unwrap().push(first);
        }
        waiter.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec![first, second]);
    }

    struct Mute;

    impl VoiceEngine for Mute {
        fn speak_once(&self, _text: &str) -> Result<()> {
            Ok(())
        }

        fn list_voices(&self) -> Vec<String> {
            Vec::new()
        }

        fn select_voice(&self, _needle: &str) -> Option<String> {
            None
        }
    }

    fn controller() -> SpeechController {
        SpeechController::new(Arc::new(Mute), DEFAULT_CHUNK_BUDGET)
    }

    #[test]
    fn test_boundary_proceeds_when_clear() {
        assert!(!controller().abort_at_boundary(0));
    }

    #[test]
    fn test_boundary_holds_pause_with_stop_until_resume() {
        let speech = controller();
        speech.pause();
        assert!(speech.flags().is_stopped());

        let resumer = {
            let speech = speech.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(120));
                speech.resume();
            })
        };

        assert!(!speech.abort_at_boundary(0));
        resumer.join().unwrap();
    }

    #[test]
    fn test_boundary_aborts_on_stop_while_held() {
        let speech = controller();
        speech.pause();

        let stopper = {
            let flags = speech.flags();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(120));
                flags.request_stop();
            })
        };

        assert!(speech.abort_at_boundary(0));
        stopper.join().unwrap();
    }

    #[test]
    fn test_boundary_aborts_jobs_issued_before_stop() {
        let speech = controller();
        let ticket = speech.turns.take_ticket();
        speech.stop();
        speech.flags.clear_stop();

        assert!(speech.abort_at_boundary(ticket));
        assert!(!speech.abort_at_boundary(ticket + 1));
    }

    #[test]
    fn test_clear_stop_keeps_pause() {
        let flags = SpeechFlags::default();
        flags.request_pause();
        flags.clear_stop();
        assert!(flags.is_paused());
        assert!(!flags.is_stopped());
    }

    #[test]
    fn test_pause_toggling_never_aborts_a_job() {
        let speech = controller();
        let chunks: Vec<String> = (0..200).map(|i| format!("chunk {i}.")).collect();
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let toggler = {
            let flags = speech.flags();
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                for _ in 0..20_000 {
                    if done.load(Ordering::SeqCst) {
                        break;
                    }
                    flags.request_pause();
                    flags.resume();
                }
                flags.resume();
            })
        };

        let outcome = speech.render_chunks(0, &chunks);
        done.store(true, Ordering::SeqCst);
        toggler.join().unwrap();

        assert_eq!(outcome, JobOutcome::Finished { spoken: 200 });
    }

    #[test]
    fn test_stop_releases_pause() {
        let flags = SpeechFlags::default();
        flags.request_pause();
        flags.request_stop();
        assert!(!flags.is_paused());
        assert!(flags.is_stopped());
    }
}
