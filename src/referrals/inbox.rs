//! Poll-and-clear referral inbox
//!
//! Delivery is at most once: `drain_all` hands the whole pending list to the
//! caller and forgets it. If the polling server drops the batch, those
//! referrals are gone.

use crate::types::{Referral, ServerId};
use crate::utils::recover;
use std::collections::HashMap;
use std::sync::Mutex;

/// Pending referrals keyed by the server that should act on them
#[derive(Debug, Default)]
pub struct ReferralInbox {
    pending: Mutex<HashMap<ServerId, Vec<Referral>>>,
}

impl ReferralInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a referral for `server_id`
    pub fn add(&self, server_id: &str, referral: Referral) {
        recover(self.pending.lock())
            .entry(server_id.to_string())
            .or_default()
            .push(referral);
    }

    /// Take everything pending for `server_id`, oldest first. Empty when
    /// nothing is pending.
    pub fn drain_all(&self, server_id: &str) -> Vec<Referral> {
        recover(self.pending.lock())
            .remove(server_id)
            .unwrap_or_default()
    }

    pub fn pending_count(&self, server_id: &str) -> usize {
        recover(self.pending.lock())
            .get(server_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn total_pending(&self) -> usize {
        recover(self.pending.lock()).values().map(Vec::len).sum()
    }
}
