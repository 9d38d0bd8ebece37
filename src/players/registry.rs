//! Player location registry
//!
//! One owned `PlayerLocation` per identity, plus an address index that maps
//! an IP to the identity bound to it. Both maps live under a single lock so
//! they are always updated together.

use crate::types::{PlayerId, PlayerLocation, ServerId};
use crate::utils::recover;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Indexes {
    by_uuid: HashMap<PlayerId, PlayerLocation>,
    /// ip -> uuid; a lookup index, not an owner
    by_ip: HashMap<String, PlayerId>,
}

/// Registry of where each player currently is
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    inner: RwLock<Indexes>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `uuid` to `ip` on `server_id`, overwriting any previous binding
    /// for either key.
    ///
    /// If `uuid` was bound to a different address, that address stops
    /// resolving. If `ip` was bound to a different identity, the address now
    /// resolves to `uuid` but the other identity's own record is left alone
    /// and still reports the old address.
    pub fn register(&self, uuid: &str, ip: &str, server_id: &str) {
        let mut inner = recover(self.inner.write());

        let previous_ip = inner.by_uuid.get(uuid).map(|player| player.ip.clone());
        if let Some(previous_ip) = previous_ip {
            if previous_ip != ip && inner.by_ip.get(&previous_ip).map(String::as_str) == Some(uuid)
            {
                inner.by_ip.remove(&previous_ip);
            }
        }

        inner.by_uuid.insert(
            uuid.to_string(),
            PlayerLocation {
                uuid: uuid.to_string(),
                ip: ip.to_string(),
                server_id: server_id.to_string(),
            },
        );
        inner.by_ip.insert(ip.to_string(), uuid.to_string());
    }

    /// Move a known player to another server. Unknown ids are ignored.
    /// Returns whether a record was updated.
    pub fn update_server(&self, uuid: &str, server_id: &str) -> bool {
        let mut inner = recover(self.inner.write());
        match inner.by_uuid.get_mut(uuid) {
            Some(player) => {
                player.server_id = server_id.to_string();
                true
            }
            None => false,
        }
    }

    pub fn get_by_uuid(&self, uuid: &str) -> Option<PlayerLocation> {
        recover(self.inner.read()).by_uuid.get(uuid).cloned()
    }

    pub fn get_by_ip(&self, ip: &str) -> Option<PlayerLocation> {
        let inner = recover(self.inner.read());
        inner
            .by_ip
            .get(ip)
            .and_then(|uuid| inner.by_uuid.get(uuid))
            .cloned()
    }

    /// Forget a player. The address entry is only dropped if it still
    /// belongs to this player. Returns the removed record.
    pub fn remove(&self, uuid: &str) -> Option<PlayerLocation> {
        let mut inner = recover(self.inner.write());
        let player = inner.by_uuid.remove(uuid)?;

        if inner.by_ip.get(&player.ip).map(String::as_str) == Some(uuid) {
            inner.by_ip.remove(&player.ip);
        }

        Some(player)
    }

    /// Number of tracked identities
    pub fn len(&self) -> usize {
        recover(self.inner.read()).by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Server ids currently holding at least one player
    pub fn servers(&self) -> Vec<ServerId> {
        let inner = recover(self.inner.read());
        let mut servers: Vec<ServerId> = inner
            .by_uuid
            .values()
            .map(|player| player.server_id.clone())
            .collect();
        servers.sort();
        servers.dedup();
        servers
    }
}
