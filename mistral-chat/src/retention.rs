//! Bounded conversation history.
//!
//! When the history grows past its cap, the oldest entries are dropped until
//! only the most recent `trim_to` remain. Trimming to a lower mark than the
//! cap means the next few appends do not each trigger another trim.

use mistral_types::ChatConfig;

/// Drop the oldest entries of `history` once it exceeds `max_count`.
///
/// `max_count == 0` means unlimited. When trimming, the newest
/// `min(trim_to_count, max_count)` entries survive in their original order.
/// Returns the number of entries removed.
///
/// # Example
///
/// ```
/// use mistral_chat::retention::trim;
///
/// let mut history = vec![1, 2, 3, 4, 5];
/// assert_eq!(trim(&mut history, 4, 2), 3);
/// assert_eq!(history, vec![4, 5]);
/// ```
pub fn trim<T>(history: &mut Vec<T>, max_count: usize, trim_to_count: usize) -> usize {
    if max_count == 0 || history.len() <= max_count {
        return 0;
    }
    let keep = trim_to_count.min(max_count);
    let removed = history.len() - keep;
    history.drain(..removed);
    removed
}

/// A history cap and the size history is trimmed down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum number of entries; `0` means unlimited.
    pub max_messages: usize,
    /// Entries kept after a trim.
    pub trim_to: usize,
}

impl RetentionPolicy {
    /// Creates a new `RetentionPolicy`.
    #[must_use]
    pub fn new(max_messages: usize, trim_to: usize) -> Self {
        Self {
            max_messages,
            trim_to,
        }
    }

    /// A policy that never trims.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0, 0)
    }

    /// The policy described by a [`ChatConfig`].
    #[must_use]
    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.max_history_messages, config.history_trim_count)
    }

    /// Apply the policy to `history`, returning the number of entries removed.
    pub fn apply<T>(&self, history: &mut Vec<T>) -> usize {
        trim(history, self.max_messages, self.trim_to)
    }

    /// Whether the trim mark fits under the cap.
    ///
    /// An invalid policy still works; the trim mark is clamped to the cap.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.max_messages == 0 || self.trim_to <= self.max_messages
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}
