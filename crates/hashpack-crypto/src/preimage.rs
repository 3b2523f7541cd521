//! Parallel randomized preimage search
//!
//! When no name index knows the path behind a key, the only way to get a
//! printable name is to find *some* string that hashes to it. The search
//! space (`alphabet.len() ^ body_len`) is far too large to enumerate, so every
//! worker draws uniformly random candidate bodies from the operating system
//! CSPRNG and checks each one. 32-bit collisions are expected, so any match is
//! an acceptable answer even if it is not the original path.
//!
//! Candidates are composed as:
//!
//! ```text
//! prefix + separator + body + '.' + suffix
//! ```
//!
//! The separator is omitted for an empty prefix and the `.` for an empty
//! suffix.
//!
//! The search is memoryless and not exhaustive, so a key with no reachable
//! preimage never terminates on its own. Callers hand in a [`CancelToken`] and
//! cancel it when they want to give up.

use crate::error::SearchError;
use crate::jenkins::one_at_a_time;
use crate::key::AssetKey;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

/// Default candidate alphabet: alphanumerics plus `_` and `-`
pub const DEFAULT_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-";

/// Default number of random characters per candidate
pub const DEFAULT_BODY_LEN: usize = 12;

/// Default separator between prefix and body
pub const DEFAULT_SEPARATOR: char = '\\';

/// Random bytes fetched from the OS per refill
const ENTROPY_BUFFER_SIZE: usize = 4096;

/// Attempts a worker accumulates before publishing them to the shared counter
const PROGRESS_BATCH: u64 = 1 << 16;

/// Cooperative cancellation flag shared between a caller and a running search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker observing this token to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Advisory attempt counter, readable while a search is running
#[derive(Debug, Clone, Default)]
pub struct SearchProgress(Arc<AtomicU64>);

impl SearchProgress {
    /// Attempts published so far across all workers
    ///
    /// Workers publish in batches, so this lags the true count slightly until
    /// the search returns.
    pub fn attempts(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Configured preimage search for one target key
#[derive(Debug, Clone)]
pub struct PreimageSearch {
    target: AssetKey,
    prefix: String,
    suffix: String,
    separator: char,
    alphabet: Vec<u8>,
    body_len: usize,
    workers: usize,
    progress: SearchProgress,
}

impl PreimageSearch {
    /// Create a search with default alphabet, body length and one worker per
    /// available CPU
    pub fn new(target: AssetKey) -> Self {
        let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self {
            target,
            prefix: String::new(),
            suffix: String::new(),
            separator: DEFAULT_SEPARATOR,
            alphabet: DEFAULT_ALPHABET.to_vec(),
            body_len: DEFAULT_BODY_LEN,
            workers,
            progress: SearchProgress::default(),
        }
    }

    /// Set the fixed text placed before the separator
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the extension appended after `.`
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the separator placed between prefix and body
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Set the characters random bodies are drawn from (ASCII only)
    pub fn with_alphabet(mut self, alphabet: &[u8]) -> Self {
        self.alphabet = alphabet.to_vec();
        self
    }

    /// Set the number of random characters per candidate
    pub fn with_body_len(mut self, body_len: usize) -> Self {
        self.body_len = body_len;
        self
    }

    /// Set the number of worker threads
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Key being searched for
    pub fn target(&self) -> AssetKey {
        self.target
    }

    /// Number of worker threads that will be started
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Handle to the shared attempt counter
    pub fn progress(&self) -> SearchProgress {
        self.progress.clone()
    }

    /// Check that the configuration can produce candidates
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.workers == 0 {
            return Err(SearchError::InvalidConfig(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.body_len == 0 {
            return Err(SearchError::InvalidConfig(
                "body length must be at least 1".to_string(),
            ));
        }
        if self.alphabet.is_empty() || self.alphabet.len() > 256 {
            return Err(SearchError::InvalidConfig(format!(
                "alphabet must hold 1..=256 symbols, got {}",
                self.alphabet.len()
            )));
        }
        if !self.alphabet.is_ascii() {
            return Err(SearchError::InvalidConfig(
                "alphabet must be ASCII".to_string(),
            ));
        }
        Ok(())
    }

    /// Run the search until a worker finds a match or `cancel` is triggered
    ///
    /// Blocks the calling thread. All workers are joined before this returns,
    /// so no worker outlives the call.
    pub fn run(&self, cancel: &CancelToken) -> Result<String, SearchError> {
        self.validate()?;

        let started = Instant::now();
        let halt = AtomicBool::new(false);
        let slot: Mutex<Option<String>> = Mutex::new(None);

        info!(
            target_key = %self.target,
            workers = self.workers,
            body_len = self.body_len,
            alphabet = self.alphabet.len(),
            "Starting preimage search"
        );

        let outcome = thread::scope(|scope| -> Result<(), SearchError> {
            let halt = &halt;
            let slot = &slot;
            let mut handles = Vec::with_capacity(self.workers);

            for id in 0..self.workers {
                let spawned = thread::Builder::new()
                    .name(format!("preimage-{id}"))
                    .spawn_scoped(scope, move || self.worker(id, halt, slot, cancel));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        halt.store(true, Ordering::Release);
                        return Err(SearchError::Spawn(e));
                    }
                }
            }

            let mut first_error = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        halt.store(true, Ordering::Release);
                        first_error.get_or_insert(e);
                    }
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }
            first_error.map_or(Ok(()), Err)
        });

        let found = slot.into_inner();
        info!(
            target_key = %self.target,
            attempts = self.progress.attempts(),
            elapsed_ms = started.elapsed().as_millis(),
            found = found.is_some(),
            "Preimage search finished"
        );

        if let Some(preimage) = found {
            return Ok(preimage);
        }
        outcome?;
        Err(SearchError::NoPreimageFound {
            target: self.target,
        })
    }

    /// Candidate buffer with the body region zeroed, plus the body range
    fn candidate_template(&self) -> (Vec<u8>, std::ops::Range<usize>) {
        let mut candidate =
            Vec::with_capacity(self.prefix.len() + self.body_len + self.suffix.len() + 5);
        candidate.extend_from_slice(self.prefix.as_bytes());
        if !self.prefix.is_empty() {
            let mut buf = [0u8; 4];
            candidate.extend_from_slice(self.separator.encode_utf8(&mut buf).as_bytes());
        }
        let body_start = candidate.len();
        candidate.resize(body_start + self.body_len, 0);
        if !self.suffix.is_empty() {
            candidate.push(b'.');
            candidate.extend_from_slice(self.suffix.as_bytes());
        }
        (candidate, body_start..body_start + self.body_len)
    }

    fn worker(
        &self,
        id: usize,
        halt: &AtomicBool,
        slot: &Mutex<Option<String>>,
        cancel: &CancelToken,
    ) -> Result<(), SearchError> {
        let (mut candidate, body) = self.candidate_template();
        let mut entropy = EntropyPool::new();
        let mut tally = Tally::new(&self.progress.0);
        let target = self.target.get();

        debug!(worker = id, "Preimage worker started");

        loop {
            if halt.load(Ordering::Acquire) || cancel.is_cancelled() {
                debug!(worker = id, "Preimage worker stopping");
                return Ok(());
            }

            entropy.fill_from_alphabet(&mut candidate[body.clone()], &self.alphabet)?;
            tally.bump();

            if one_at_a_time(&candidate) == target {
                // Only the first worker to flip the flag may publish
                if halt
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    *slot.lock() = Some(String::from_utf8_lossy(&candidate).into_owned());
                    debug!(worker = id, "Preimage worker found a match");
                }
                return Ok(());
            }
        }
    }
}

/// Search for a string whose hash equals `target`
///
/// Uses the default alphabet and body length. Blocks until a match is found;
/// there is no way to cancel this form, use [`PreimageSearch::run`] with a
/// [`CancelToken`] when the caller needs to give up. Returns `None` only if the
/// search could not run (zero workers, random source failure).
pub fn search(target: AssetKey, prefix: &str, suffix: &str, worker_count: usize) -> Option<String> {
    PreimageSearch::new(target)
        .with_prefix(prefix)
        .with_suffix(suffix)
        .with_workers(worker_count)
        .run(&CancelToken::new())
        .ok()
}

/// Per-worker buffer of OS randomness
struct EntropyPool {
    buf: [u8; ENTROPY_BUFFER_SIZE],
    pos: usize,
}

impl EntropyPool {
    fn new() -> Self {
        Self {
            buf: [0u8; ENTROPY_BUFFER_SIZE],
            pos: ENTROPY_BUFFER_SIZE,
        }
    }

    fn next_byte(&mut self) -> Result<u8, getrandom::Error> {
        if self.pos == self.buf.len() {
            getrandom::fill(&mut self.buf)?;
            self.pos = 0;
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Fill `out` with symbols drawn uniformly from `alphabet`
    ///
    /// Bytes at or above the largest multiple of the alphabet size are
    /// rejected so every symbol is equally likely.
    fn fill_from_alphabet(&mut self, out: &mut [u8], alphabet: &[u8]) -> Result<(), getrandom::Error> {
        let len = alphabet.len();
        let limit = 256 - (256 % len);
        for symbol in out {
            loop {
                let byte = usize::from(self.next_byte()?);
                if byte < limit {
                    *symbol = alphabet[byte % len];
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Batches attempt counts so workers rarely touch the shared counter
struct Tally<'a> {
    counter: &'a AtomicU64,
    pending: u64,
}

impl<'a> Tally<'a> {
    fn new(counter: &'a AtomicU64) -> Self {
        Self {
            counter,
            pending: 0,
        }
    }

    fn bump(&mut self) {
        self.pending += 1;
        if self.pending >= PROGRESS_BATCH {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.pending > 0 {
            self.counter.fetch_add(self.pending, Ordering::Relaxed);
            self.pending = 0;
        }
    }
}

impl Drop for Tally<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::jenkins::hash_path;
    use std::time::Duration;

    #[test]
    fn test_finds_preimage_with_prefix_and_suffix() {
        let target = hash_path("ab\\ba.bin");
        let search = PreimageSearch::new(target)
            .with_prefix("ab")
            .with_suffix("bin")
            .with_alphabet(b"ab")
            .with_body_len(2)
            .with_workers(4);

        let found = search.run(&CancelToken::new()).expect("search should succeed");
        assert_eq!(hash_path(&found), target);
        assert!(found.starts_with("ab\\"));
        assert!(found.ends_with(".bin"));
        assert!(search.progress().attempts() >= 1);
    }

    #[test]
    fn test_finds_preimage_without_prefix() {
        let target = hash_path("abab.bin");
        let found = PreimageSearch::new(target)
            .with_suffix("bin")
            .with_alphabet(b"ab")
            .with_body_len(4)
            .with_workers(3)
            .run(&CancelToken::new())
            .expect("search should succeed");

        assert_eq!(hash_path(&found), target);
        assert_eq!(found.len(), "abab.bin".len());
    }

    #[test]
    fn test_cancellation_stops_unreachable_search() {
        // Only one candidate exists and it does not match
        let unreachable = AssetKey::new(hash_path("a.bin").get() ^ 1);
        let search = PreimageSearch::new(unreachable)
            .with_suffix("bin")
            .with_alphabet(b"a")
            .with_body_len(1)
            .with_workers(2);
        let progress = search.progress();
        let cancel = CancelToken::new();

        let result = thread::scope(|scope| {
            let canceller = cancel.clone();
            scope.spawn(move || {
                thread::sleep(Duration::from_millis(50));
                canceller.cancel();
            });
            search.run(&cancel)
        });

        assert!(matches!(
            result,
            Err(SearchError::NoPreimageFound { target }) if target == unreachable
        ));
        assert!(progress.attempts() > 0);
    }

    #[test]
    fn test_pre_cancelled_token_returns_immediately() {
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(cancel.is_cancelled());

        let result = PreimageSearch::new(AssetKey::new(1))
            .with_workers(2)
            .run(&cancel);
        assert!(matches!(result, Err(SearchError::NoPreimageFound { .. })));
    }

    #[test]
    fn test_invalid_configs() {
        let base = PreimageSearch::new(AssetKey::new(1));
        assert!(matches!(
            base.clone().with_workers(0).validate(),
            Err(SearchError::InvalidConfig(_))
        ));
        assert!(matches!(
            base.clone().with_alphabet(b"").validate(),
            Err(SearchError::InvalidConfig(_))
        ));
        assert!(matches!(
            base.clone().with_alphabet(&[0xC3, 0xA9]).validate(),
            Err(SearchError::InvalidConfig(_))
        ));
        assert!(matches!(
            base.clone().with_body_len(0).validate(),
            Err(SearchError::InvalidConfig(_))
        ));
        assert!(base.validate().is_ok());
    }

    #[test]
    fn test_candidate_template_layout() {
        let search = PreimageSearch::new(AssetKey::new(0))
            .with_prefix("data")
            .with_suffix("bin")
            .with_body_len(3);
        let (candidate, body) = search.candidate_template();
        assert_eq!(&candidate[..body.start], b"data\\");
        assert_eq!(&candidate[body.end..], b".bin");
        assert_eq!(body.len(), 3);

        let bare = PreimageSearch::new(AssetKey::new(0)).with_body_len(5);
        let (candidate, body) = bare.candidate_template();
        assert_eq!(candidate.len(), 5);
        assert_eq!(body, 0..5);

        let slash = PreimageSearch::new(AssetKey::new(0))
            .with_prefix("ui")
            .with_separator('/')
            .with_body_len(1);
        let (candidate, body) = slash.candidate_template();
        assert_eq!(&candidate[..body.start], b"ui/");
        assert_eq!(candidate.len(), 4);
    }

    #[test]
    fn test_entropy_pool_draws_every_symbol() {
        let mut pool = EntropyPool::new();
        let mut seen = [false; 3];
        let mut body = [0u8; 64];
        for _ in 0..16 {
            pool.fill_from_alphabet(&mut body, b"xyz").unwrap();
            for &b in &body {
                let idx = b"xyz".iter().position(|&s| s == b).expect("symbol from alphabet");
                seen[idx] = true;
            }
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn test_default_alphabet_is_uniform_friendly() {
        assert_eq!(DEFAULT_ALPHABET.len(), 64);
        assert!(DEFAULT_ALPHABET.is_ascii());
        assert_eq!(PreimageSearch::new(AssetKey::new(0)).body_len, DEFAULT_BODY_LEN);
    }
}
