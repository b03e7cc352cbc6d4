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

//! Flat-file snapshot format (§6): `"MasternodeBudget"` magic, a 4-byte
//! network tag, the serialized active sets, and a trailing double-SHA256
//! content hash. Transient bookkeeping — seen-sets, orphan queues,
//! ask-throttle entries, per-budget `payment_history` and `auto_checked` —
//! is never written; a freshly loaded manager starts those empty and lets
//! the gossip layer and the next tally repopulate them.

use std::{
    io::{Read, Write},
    path::Path,
};

use darkfi_serial::{deserialize, serialize, SerialDecodable, SerialEncodable};

use crate::{
    error::{Error, Result},
    finalized_budget::FinalizedBudget,
    hash::Hash256,
    manager::BudgetManager,
    proposal::Proposal,
};

const MAGIC: &str = "MasternodeBudget";

/// Everything persisted across a restart: the active proposal and
/// finalized-budget sets, votes included (they live inside each item).
#[derive(Clone, Debug, Default, SerialEncodable, SerialDecodable)]
struct Snapshot {
    proposals: Vec<Proposal>,
    budgets: Vec<FinalizedBudget>,
}

/// Packs `config.network_tag` into 4 bytes: the first 4 ASCII bytes,
/// space-padded, so the file format has a fixed-width field to check
/// without dragging the whole tag string into the header.
fn network_tag_bytes(tag: &str) -> [u8; 4] {
    let mut out = [b' '; 4];
    for (i, b) in tag.as_bytes().iter().take(4).enumerate() {
        out[i] = *b;
    }
    out
}

impl BudgetManager {
    /// Writes the current active sets to `path` (§6 flat-file format).
    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = {
            let proposals = self.cs_proposals.lock().await;
            let budgets = self.cs_budgets.lock().await;
            Snapshot {
                proposals: proposals.active.values().cloned().collect(),
                budgets: budgets.active.values().cloned().collect(),
            }
        };

        let mut body = Vec::new();
        body.extend_from_slice(&serialize(&MAGIC.to_string()));
        body.extend_from_slice(&network_tag_bytes(&self.config.network_tag));
        body.extend_from_slice(&serialize(&snapshot));

        let content_hash = Hash256::double_sha256(&body);
        body.extend_from_slice(content_hash.as_bytes());

        let mut file = std::fs::File::create(path)?;
        file.write_all(&body)?;
        Ok(())
    }

    /// Loads `path` and replaces the active proposal and finalized-budget
    /// sets with its contents. Rejects a magic or network-tag mismatch and
    /// a failed content-hash check without touching existing state; on a
    /// decode failure, clears the active sets rather than leaving a
    /// half-applied snapshot in place.
    pub async fn load_snapshot(&self, path: &Path) -> Result<()> {
        let mut raw = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut raw)?;

        if raw.len() < 32 {
            return Err(Error::Persistence("snapshot file too short".to_string()))
        }
        let split = raw.len() - 32;
        let (body, trailing_hash) = raw.split_at(split);
        let expected_hash = Hash256::double_sha256(body);
        if expected_hash.as_bytes() != trailing_hash {
            return Err(Error::Persistence("snapshot content hash mismatch".to_string()))
        }

        let mut cursor = std::io::Cursor::new(body);
        let magic: String = darkfi_serial::Decodable::decode(&mut cursor)
            .map_err(|e| Error::Persistence(format!("failed to decode magic: {e}")))?;
        if magic != MAGIC {
            return Err(Error::Persistence(format!("unexpected magic {magic:?}")))
        }

        let mut tag_bytes = [0u8; 4];
        cursor
            .read_exact(&mut tag_bytes)
            .map_err(|e| Error::Persistence(format!("failed to read network tag: {e}")))?;
        if tag_bytes != network_tag_bytes(&self.config.network_tag) {
            return Err(Error::Persistence("snapshot network tag does not match configured network".to_string()))
        }

        let remainder = &body[cursor.position() as usize..];
        let snapshot: Snapshot = match deserialize(remainder) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let mut proposals = self.cs_proposals.lock().await;
                proposals.active.clear();
                proposals.immature.clear();
                proposals.seen.clear();
                drop(proposals);
                let mut budgets = self.cs_budgets.lock().await;
                budgets.active.clear();
                budgets.immature.clear();
                budgets.seen.clear();
                return Err(Error::Persistence(format!("failed to decode snapshot body: {e}")))
            }
        };

        let mut proposals = self.cs_proposals.lock().await;
        proposals.active.clear();
        proposals.immature.clear();
        proposals.seen.clear();
        for p in snapshot.proposals {
            proposals.active.insert(p.hash(), p);
        }
        drop(proposals);

        let mut budgets = self.cs_budgets.lock().await;
        budgets.active.clear();
        budgets.immature.clear();
        budgets.seen.clear();
        for b in snapshot.budgets {
            budgets.active.insert(b.hash(), b);
        }
        Ok(())
    }
}
