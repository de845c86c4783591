//! Per-document allocation of logical keys to concrete coordinates.

use std::collections::HashMap;

use tally_core::{CellAddress, DocumentId, LogicalKey};
use tracing::trace;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
struct Placement {
    address: CellAddress,
    seq: u64,
}

/// Maps logical keys to cell addresses inside one document.
///
/// Allocation is idempotent per key and injective per coordinate. There is
/// exactly one resolver per document variant; nothing here is shared across
/// variants.
#[derive(Debug, Clone)]
pub struct Resolver {
    document: DocumentId,
    by_key: HashMap<LogicalKey, Placement>,
    by_coord: HashMap<(String, u32, u32), LogicalKey>,
    next_seq: u64,
}

impl Resolver {
    pub fn new(document: DocumentId) -> Self {
        Self {
            document,
            by_key: HashMap::new(),
            by_coord: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// Returns the address of `key`, allocating it at `(sheet, row, col)` on
    /// first use. Later calls for the same key return the cached address
    /// whatever coordinates they request.
    pub fn resolve(&mut self, key: &LogicalKey, sheet: &str, row: u32, col: u32) -> Result<CellAddress> {
        if let Some(p) = self.by_key.get(key) {
            return Ok(p.address.clone());
        }
        let coord = (sheet.to_string(), row, col);
        if let Some(owner) = self.by_coord.get(&coord) {
            return Err(EngineError::AddressCollision {
                address: CellAddress::new(self.document, sheet, row, col),
                existing: owner.to_string(),
                requested: key.to_string(),
            });
        }
        let address = CellAddress::new(self.document, sheet, row, col);
        trace!(%key, %address, "allocated");
        self.by_coord.insert(coord, key.clone());
        self.by_key.insert(
            key.clone(),
            Placement {
                address: address.clone(),
                seq: self.next_seq,
            },
        );
        self.next_seq += 1;
        Ok(address)
    }

    /// Address of a key some builder already resolved.
    pub fn address_of(&self, key: &LogicalKey) -> Result<CellAddress> {
        self.by_key
            .get(key)
            .map(|p| p.address.clone())
            .ok_or_else(|| EngineError::unresolved(key))
    }

    pub fn contains(&self, key: &LogicalKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Position of the key in allocation order.
    pub fn sequence_of(&self, key: &LogicalKey) -> Option<u64> {
        self.by_key.get(key).map(|p| p.seq)
    }

    /// The key that owns a coordinate, if any.
    pub fn key_at(&self, addr: &CellAddress) -> Option<&LogicalKey> {
        if addr.document != self.document {
            return None;
        }
        self.by_coord.get(&(addr.sheet.clone(), addr.row, addr.col))
    }

    /// All placements in allocation order.
    pub fn placements(&self) -> Vec<(&LogicalKey, &CellAddress)> {
        let mut out: Vec<_> = self.by_key.iter().map(|(k, p)| (k, p, p.seq)).collect();
        out.sort_by_key(|(_, _, seq)| *seq);
        out.into_iter().map(|(k, p, _)| (k, &p.address)).collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
