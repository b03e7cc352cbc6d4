/* This file is part of govbudget
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Gossip/sync wire layer (§4.6, §6). The actual P2P transport — envelope
//! framing, peer ban scoring, inventory relay — is out of scope (§1, §5)
//! and is reached only through the [`P2pTransport`] interface below, the
//! same way the engine reaches the chain, the masternode directory and the
//! wallet through their own traits in [`crate::chain`].

pub mod messages;

use async_trait::async_trait;

pub use messages::{
    BudgetVoteSyncMessage, FinalizedBudgetMessage, FinalizedVoteMessage, InventoryItem,
    InventoryKind, P2pMessage, ProposalMessage, ProposalVoteMessage, SyncStatusCountMessage,
};

/// Ban score increment applied for collateral- or signature-related
/// misbehavior originating from a peer (§7).
pub const BAN_SCORE_BAD_SIGNATURE: u32 = 20;

/// Ban score increment for a peer that asks for a second full sync on
/// mainnet after already receiving one (§4.6).
pub const BAN_SCORE_REPEAT_FULL_SYNC: u32 = 20;

/// A remote peer handle, opaque to the engine beyond identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(pub String);

/// The engine's view of the P2P transport: push messages to one peer,
/// broadcast to all, and report misbehavior. Production wiring adapts
/// whatever concrete transport the host daemon uses; tests use an
/// in-memory fake.
#[async_trait]
pub trait P2pTransport: Send + Sync {
    /// Send a single message to one peer.
    async fn send(&self, peer: &PeerId, command: &'static str, payload: Vec<u8>);

    /// Broadcast a message to every connected peer.
    async fn broadcast(&self, command: &'static str, payload: Vec<u8>);

    /// Increase `peer`'s misbehavior score; the transport owns ban policy.
    async fn increase_ban_score(&self, peer: &PeerId, amount: u32);

    /// Whether this peer has already received a full (non-partial) sync on
    /// this network — a peer may request at most one (§4.6).
    async fn has_full_synced(&self, peer: &PeerId) -> bool;

    /// Record that `peer` has now received a full sync.
    async fn mark_full_synced(&self, peer: &PeerId);

    /// Whether the local node itself considers its blockchain fully synced
    /// (gates the periodic re-broadcast round, §4.7).
    fn is_synced(&self) -> bool;

    /// Every currently connected peer, for the periodic partial-sync push (§4.7).
    async fn connected_peers(&self) -> Vec<PeerId>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
    };

    #[derive(Default)]
    pub struct FakeTransport {
        pub sent: Mutex<Vec<(PeerId, &'static str)>>,
        pub broadcasts: Mutex<Vec<&'static str>>,
        pub ban_scores: Mutex<std::collections::HashMap<PeerId, u32>>,
        pub full_synced: Mutex<HashSet<PeerId>>,
        pub peers: Mutex<Vec<PeerId>>,
    }

    #[async_trait]
    impl P2pTransport for FakeTransport {
        async fn send(&self, peer: &PeerId, command: &'static str, _payload: Vec<u8>) {
            self.sent.lock().unwrap().push((peer.clone(), command));
        }
        async fn broadcast(&self, command: &'static str, _payload: Vec<u8>) {
            self.broadcasts.lock().unwrap().push(command);
        }
        async fn increase_ban_score(&self, peer: &PeerId, amount: u32) {
            *self.ban_scores.lock().unwrap().entry(peer.clone()).or_insert(0) += amount;
        }
        async fn has_full_synced(&self, peer: &PeerId) -> bool {
            self.full_synced.lock().unwrap().contains(peer)
        }
        async fn mark_full_synced(&self, peer: &PeerId) {
            self.full_synced.lock().unwrap().insert(peer.clone());
        }
        fn is_synced(&self) -> bool {
            true
        }
        async fn connected_peers(&self) -> Vec<PeerId> {
            self.peers.lock().unwrap().clone()
        }
    }

    #[test]
    fn fake_transport_tracks_ban_score() {
        smol::block_on(async {
            let t = Arc::new(FakeTransport::default());
            let peer = PeerId("peer-a".to_string());
            t.increase_ban_score(&peer, BAN_SCORE_BAD_SIGNATURE).await;
            assert_eq!(*t.ban_scores.lock().unwrap().get(&peer).unwrap(), 20);
        });
    }

    #[test]
    fn fake_transport_latches_full_sync() {
        smol::block_on(async {
            let t = Arc::new(FakeTransport::default());
            let peer = PeerId("peer-a".to_string());
            assert!(!t.has_full_synced(&peer).await);
            t.mark_full_synced(&peer).await;
            assert!(t.has_full_synced(&peer).await);
        });
    }
}
