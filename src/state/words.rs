//! Secret word supply.
//!
//! A working set of unused words drawn uniformly at random. Once fewer than
//! `refill_threshold` words remain after a draw, the set is restored to the
//! full source, so a word can only recur after a complete cycle.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::PoolError;

/// On-disk shape of the remaining set.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedPool {
    remaining: Vec<String>,
}

#[derive(Debug)]
pub struct WordPool {
    source: Vec<String>,
    remaining: Vec<String>,
    refill_threshold: usize,
    path: Option<PathBuf>,
    rng: StdRng,
}

impl WordPool {
    /// In-memory pool over `source`. Blank and duplicate words are dropped.
    pub fn new<I, S>(source: I, refill_threshold: usize) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words: Vec<String> = Vec::new();
        for word in source {
            let word = word.into().trim().to_string();
            if !word.is_empty() && !words.contains(&word) {
                words.push(word);
            }
        }
        if words.is_empty() {
            return Err(PoolError::EmptySource);
        }

        let refill_threshold = refill_threshold.clamp(1, words.len());
        Ok(Self {
            remaining: words.clone(),
            source: words,
            refill_threshold,
            path: None,
            rng: StdRng::from_os_rng(),
        })
    }

    /// Pool whose remaining set is stored at `path`.
    ///
    /// A missing, unreadable, or depleted file starts from the full source.
    pub fn persisted<I, S>(
        source: I,
        refill_threshold: usize,
        path: impl Into<PathBuf>,
    ) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut pool = Self::new(source, refill_threshold)?;
        let path = path.into();

        match load(&path) {
            Ok(Some(saved)) => {
                let restored: Vec<String> = saved
                    .remaining
                    .into_iter()
                    .filter(|w| pool.source.contains(w))
                    .collect();
                if restored.len() >= pool.refill_threshold {
                    pool.remaining = restored;
                } else {
                    debug!(path = %path.display(), "persisted word pool depleted, refilling");
                }
            }
            Ok(None) => debug!(path = %path.display(), "no persisted word pool, starting full"),
            Err(err) => warn!(error = %err, "ignoring persisted word pool"),
        }

        pool.path = Some(path);
        pool.persist();
        Ok(pool)
    }

    /// Pool configured by `config`: persisted when a path is set.
    pub fn from_config<I, S>(source: I, config: &SessionConfig) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match &config.word_pool_path {
            Some(path) => Self::persisted(source, config.refill_threshold, path.clone()),
            None => Self::new(source, config.refill_threshold),
        }
    }

    /// Replace the random source (for deterministic tests).
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    /// Draw a word.
    pub fn next_word(&mut self) -> String {
        if self.remaining.is_empty() {
            self.refill();
        }
        let index = self.rng.random_range(0..self.remaining.len());
        let word = self.remaining.swap_remove(index);

        if self.remaining.len() < self.refill_threshold {
            debug!(remaining = self.remaining.len(), "word pool below threshold, refilling");
            self.refill();
        }
        self.persist();
        word
    }

    fn refill(&mut self) {
        self.remaining = self.source.clone();
    }

    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn refill_threshold(&self) -> usize {
        self.refill_threshold
    }

    /// Failures are logged, never surfaced.
    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = save(path, &self.remaining) {
            warn!(error = %err, "failed to persist word pool");
        }
    }
}

fn load(path: &Path) -> Result<Option<PersistedPool>, PoolError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PoolError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| PoolError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

fn save(path: &Path, remaining: &[String]) -> Result<(), PoolError> {
    let body = serde_json::to_string(&PersistedPool {
        remaining: remaining.to_vec(),
    })
    .map_err(|source| PoolError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;

    // Write then rename so a crash never leaves a truncated file.
    let tmp = path.with_extension("tmp");
    let io_err = |source| PoolError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, body).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn words(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("word{}", i)).collect()
    }

    #[test]
    fn test_empty_source_rejected() {
        assert!(matches!(
            WordPool::new(Vec::<String>::new(), 1),
            Err(PoolError::EmptySource)
        ));
        assert!(matches!(
            WordPool::new(vec!["  ", ""], 1),
            Err(PoolError::EmptySource)
        ));
    }

    #[test]
    fn test_no_repeat_within_cycle() {
        let mut pool = WordPool::new(words(10), 1).unwrap().with_seed(7);

        let drawn: HashSet<String> = (0..10).map(|_| pool.next_word()).collect();
        assert_eq!(drawn.len(), 10);
        // Last draw emptied the set, which refilled it
        assert_eq!(pool.remaining().len(), 10);
    }

    #[test]
    fn test_refill_exactly_below_threshold() {
        let mut pool = WordPool::new(words(10), 4).unwrap().with_seed(1);

        for expected in [9, 8, 7, 6, 5, 4] {
            pool.next_word();
            assert_eq!(pool.remaining().len(), expected);
        }
        // 4 -> 3 drops below the threshold
        pool.next_word();
        assert_eq!(pool.remaining().len(), 10);
    }

    #[test]
    fn test_threshold_clamped_to_source() {
        let pool = WordPool::new(words(3), 50).unwrap();
        assert_eq!(pool.refill_threshold(), 3);

        let pool = WordPool::new(words(3), 0).unwrap();
        assert_eq!(pool.refill_threshold(), 1);
    }

    #[test]
    fn test_duplicates_dropped() {
        let pool = WordPool::new(vec!["apple", "apple ", "pear"], 1).unwrap();
        assert_eq!(pool.source_len(), 2);
    }

    #[test]
    fn test_persisted_pool_restores_remaining() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");

        let mut pool = WordPool::persisted(words(6), 2, &path).unwrap().with_seed(3);
        let first = pool.next_word();
        drop(pool);

        let reloaded = WordPool::persisted(words(6), 2, &path).unwrap();
        assert_eq!(reloaded.remaining().len(), 5);
        assert!(!reloaded.remaining().contains(&first));
    }

    #[test]
    fn test_persisted_pool_resets_when_depleted_or_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");

        fs::write(&path, r#"{"remaining":["word0"]}"#).unwrap();
        let pool = WordPool::persisted(words(6), 2, &path).unwrap();
        assert_eq!(pool.remaining().len(), 6);

        fs::write(&path, "not json").unwrap();
        let pool = WordPool::persisted(words(6), 2, &path).unwrap();
        assert_eq!(pool.remaining().len(), 6);
    }
}
