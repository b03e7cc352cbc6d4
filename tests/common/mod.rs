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

//! Fake `ChainView`/`MasternodeDirectory`/`Wallet`/`P2pTransport` used by
//! the end-to-end scenario tests, independent of the crate's own internal
//! `#[cfg(test)]` fakes (those aren't visible outside the crate).

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use govbudget::{
    chain::{
        ChainTransaction, ChainTxLookup, ChainView, MasternodeDirectory, OutPoint, PublicKey,
        Script, Signature, TxOutput, Wallet,
    },
    config::Config,
    hash::Hash256,
    manager::BudgetManager,
    net::{P2pTransport, PeerId},
    rng::RandomSource,
    schedule::{Network, COIN},
    time::Timestamp,
    Result,
};

#[derive(Default)]
pub struct FakeChain {
    pub txs: Mutex<HashMap<Hash256, ChainTxLookup>>,
    pub now: Mutex<i64>,
    pub height: Mutex<u64>,
}

impl FakeChain {
    pub fn insert_confirmed(&self, txid: Hash256, outputs: Vec<TxOutput>, confirmations: u32) {
        self.txs.lock().unwrap().insert(
            txid,
            ChainTxLookup {
                tx: ChainTransaction { outputs, locktime: 0 },
                confirmations,
                block_time: Some(Timestamp(1_000)),
            },
        );
    }
}

#[async_trait]
impl ChainView for FakeChain {
    async fn get_transaction(&self, txid: &Hash256) -> Option<ChainTxLookup> {
        self.txs.lock().unwrap().get(txid).map(|l| ChainTxLookup {
            tx: l.tx.clone(),
            confirmations: l.confirmations,
            block_time: l.block_time,
        })
    }
    fn adjusted_time(&self) -> Timestamp {
        Timestamp(*self.now.lock().unwrap())
    }
    fn best_height(&self) -> u64 {
        *self.height.lock().unwrap()
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    pub enabled: Mutex<HashSet<OutPoint>>,
    pub keys: Mutex<HashMap<OutPoint, PublicKey>>,
}

impl FakeDirectory {
    pub fn register(&self, outpoint: OutPoint) {
        self.enabled.lock().unwrap().insert(outpoint);
        self.keys.lock().unwrap().insert(outpoint, PublicKey(vec![1]));
    }
}

#[async_trait]
impl MasternodeDirectory for FakeDirectory {
    async fn is_enabled(&self, outpoint: &OutPoint) -> bool {
        self.enabled.lock().unwrap().contains(outpoint)
    }
    async fn public_key(&self, outpoint: &OutPoint) -> Option<PublicKey> {
        self.keys.lock().unwrap().get(outpoint).cloned()
    }
    async fn enabled_count(&self, _min_protocol: u32) -> u64 {
        self.enabled.lock().unwrap().len() as u64
    }
}

pub struct FakeWallet;

#[async_trait]
impl Wallet for FakeWallet {
    fn our_outpoint(&self) -> Option<OutPoint> {
        Some(OutPoint { txid: Hash256([200; 32]), vout: 0 })
    }
    fn sign(&self, _message: &[u8]) -> Result<Signature> {
        Ok(Signature(vec![1]))
    }
    async fn create_collateral_tx(&self, _item_hash: Hash256, _fee: u64) -> Result<Hash256> {
        Ok(Hash256([201; 32]))
    }
}

#[derive(Default)]
pub struct FakeTransport {
    pub sent: Mutex<Vec<(PeerId, &'static str)>>,
    pub broadcasts: Mutex<Vec<&'static str>>,
    pub ban_scores: Mutex<HashMap<PeerId, u32>>,
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

/// Wires a fresh [`BudgetManager`] over the fakes above, with `enabled`
/// masternodes pre-registered in the directory.
pub fn test_manager(config: Config, enabled: u64) -> (Arc<BudgetManager>, Arc<FakeChain>, Arc<FakeDirectory>, Arc<FakeTransport>) {
    let chain = Arc::new(FakeChain::default());
    let directory = Arc::new(FakeDirectory::default());
    for i in 0..enabled {
        let bytes = (i as u32).to_be_bytes();
        let mut txid = [0u8; 32];
        txid[28..32].copy_from_slice(&bytes);
        directory.register(OutPoint { txid: Hash256(txid), vout: 0 });
    }
    let transport = Arc::new(FakeTransport::default());
    let manager = Arc::new(BudgetManager::new(
        config,
        Network::Testnet { fixed_subsidy: 100 * COIN },
        chain.clone(),
        directory.clone(),
        Some(Arc::new(FakeWallet)),
        transport.clone(),
        Arc::new(OsDeterministicRng),
    ));
    (manager, chain, directory, transport)
}

/// Deterministic stand-in for `OsRandomSource` in end-to-end tests: the
/// auto-vote firing check in scenario S5 doesn't need genuine randomness,
/// only a source that always fires so the scenario is reproducible.
pub struct OsDeterministicRng;

impl RandomSource for OsDeterministicRng {
    fn next_below(&self, _bound: u32) -> u32 {
        0
    }
}
