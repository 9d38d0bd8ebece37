//! Per-mode FIFO wait queues
//!
//! One store-wide lock covers every mode. Operations on the same mode are
//! therefore atomic with respect to each other, which is all the matcher
//! needs: it checks a size and then pops, and the pop re-validates.

use crate::types::{Mode, PlayerId, QueueEntry};
use crate::utils::{current_timestamp, recover};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tracing::debug;

/// Store of waiting players keyed by mode
#[derive(Debug, Default)]
pub struct WaitQueueStore {
    queues: RwLock<HashMap<Mode, VecDeque<QueueEntry>>>,
}

impl WaitQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a player to a mode's queue, stamping the join time.
    ///
    /// No duplicate detection: joining twice enqueues twice. Returns the
    /// queue size after the join, which is also the player's position.
    pub fn join(&self, mode: &str, mut entry: QueueEntry) -> usize {
        entry.joined_at = current_timestamp();

        let mut queues = recover(self.queues.write());
        let queue = queues.entry(mode.to_string()).or_default();
        queue.push_back(entry);

        debug!("Queue '{}' grew to {}", mode, queue.len());
        queue.len()
    }

    /// Remove the first entry for `uuid`, keeping everyone else in order
    pub fn leave(&self, mode: &str, uuid: &str) -> bool {
        let mut queues = recover(self.queues.write());
        let Some(queue) = queues.get_mut(mode) else {
            return false;
        };

        match queue.iter().position(|entry| entry.uuid == uuid) {
            Some(index) => {
                queue.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove and return the `n` longest-waiting players in join order.
    ///
    /// All or nothing: `None` when the mode holds fewer than `n` entries
    /// (an unknown mode holds none), and the queue is left untouched.
    pub fn pop(&self, mode: &str, n: usize) -> Option<Vec<QueueEntry>> {
        let mut queues = recover(self.queues.write());
        let Some(queue) = queues.get_mut(mode) else {
            return (n == 0).then(Vec::new);
        };

        if queue.len() < n {
            return None;
        }

        Some(queue.drain(..n).collect())
    }

    /// Number of players waiting in a mode; 0 for unknown modes
    pub fn size(&self, mode: &str) -> usize {
        recover(self.queues.read())
            .get(mode)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Up to `n` of the longest-waiting players, without removing them
    pub fn peek(&self, mode: &str, n: usize) -> Vec<QueueEntry> {
        recover(self.queues.read())
            .get(mode)
            .map(|queue| queue.iter().take(n).cloned().collect())
            .unwrap_or_default()
    }

    /// Every mode that has a queue, including ones that are now empty.
    /// Sorted so tick order is stable.
    pub fn modes(&self) -> Vec<Mode> {
        let mut modes: Vec<Mode> = recover(self.queues.read()).keys().cloned().collect();
        modes.sort();
        modes
    }

    /// Size of every known queue, sorted by mode
    pub fn sizes(&self) -> Vec<(Mode, usize)> {
        let mut sizes: Vec<(Mode, usize)> = recover(self.queues.read())
            .iter()
            .map(|(mode, queue)| (mode.clone(), queue.len()))
            .collect();
        sizes.sort();
        sizes
    }

    /// Total number of waiting players across all modes
    pub fn total_waiting(&self) -> usize {
        recover(self.queues.read()).values().map(VecDeque::len).sum()
    }

    /// Whether `uuid` is currently waiting in `mode`
    pub fn contains(&self, mode: &str, uuid: &PlayerId) -> bool {
        recover(self.queues.read())
            .get(mode)
            .is_some_and(|queue| queue.iter().any(|entry| &entry.uuid == uuid))
    }

    /// Drop every entry that joined before `cutoff`, in every mode.
    ///
    /// Returns what was removed, grouped by mode in queue order. Remaining
    /// entries keep their relative order.
    pub fn remove_expired(&self, cutoff: DateTime<Utc>) -> Vec<(Mode, QueueEntry)> {
        let mut queues = recover(self.queues.write());
        let mut expired = Vec::new();

        for (mode, queue) in queues.iter_mut() {
            if !queue.iter().any(|entry| entry.joined_at < cutoff) {
                continue;
            }

            let (stale, fresh): (VecDeque<_>, VecDeque<_>) = std::mem::take(queue)
                .into_iter()
                .partition(|entry| entry.joined_at < cutoff);
            *queue = fresh;
            expired.extend(stale.into_iter().map(|entry| (mode.clone(), entry)));
        }

        expired
    }
}
