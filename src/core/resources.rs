use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Opaque handle to a GPU-side object owned by the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u32);

impl ResourceId {
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Program,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub label: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("resource {0} is not live")]
    NotLive(ResourceId),
    #[error("resource {id} is a {actual:?}, expected {expected:?}")]
    WrongKind {
        id: ResourceId,
        expected: ResourceKind,
        actual: ResourceKind,
    },
    #[error("resource {0} is referenced by a pending draw")]
    InUse(ResourceId),
}

/// Bookkeeping for every handle acquired before the loop starts
///
/// Each id is handed out once and can leave the live set once, which is
/// what makes a double release or a leak observable. Ids touched by a draw
/// stay pending until the frame is presented and cannot be released
/// in between.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    next_id: u32,
    live: Vec<ResourceEntry>,
    pending: HashSet<ResourceId>,
    released: usize,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next [`insert`](Self::insert) will use
    pub fn peek_id(&self) -> ResourceId {
        ResourceId(self.next_id)
    }

    /// Record a resource the backend created under [`peek_id`](Self::peek_id)
    pub fn insert(&mut self, kind: ResourceKind, label: impl Into<String>) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.live.push(ResourceEntry {
            id,
            kind,
            label: label.into(),
        });
        id
    }

    pub fn get(&self, id: ResourceId) -> Option<&ResourceEntry> {
        self.live.iter().find(|entry| entry.id == id)
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.get(id).is_some()
    }

    /// Check `id` is live and of `kind`
    pub fn expect_kind(&self, id: ResourceId, kind: ResourceKind) -> Result<(), ResourceError> {
        let entry = self.get(id).ok_or(ResourceError::NotLive(id))?;
        if entry.kind != kind {
            return Err(ResourceError::WrongKind {
                id,
                expected: kind,
                actual: entry.kind,
            });
        }
        Ok(())
    }

    /// Pin `id` until the current frame is presented
    pub fn mark_pending(&mut self, id: ResourceId) -> Result<(), ResourceError> {
        if !self.is_live(id) {
            return Err(ResourceError::NotLive(id));
        }
        self.pending.insert(id);
        Ok(())
    }

    pub fn is_pending(&self, id: ResourceId) -> bool {
        self.pending.contains(&id)
    }

    /// Unpin everything after present
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Remove a single resource from the live set
    pub fn release(&mut self, id: ResourceId) -> Result<ResourceEntry, ResourceError> {
        if self.pending.contains(&id) {
            return Err(ResourceError::InUse(id));
        }
        let index = self
            .live
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(ResourceError::NotLive(id))?;
        self.released += 1;
        Ok(self.live.remove(index))
    }

    /// Remove every live resource, most recently acquired first
    pub fn release_all(&mut self) -> Result<Vec<ResourceEntry>, ResourceError> {
        if let Some(&id) = self.pending.iter().min() {
            return Err(ResourceError::InUse(id));
        }
        self.released += self.live.len();
        let mut entries = std::mem::take(&mut self.live);
        entries.reverse();
        Ok(entries)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn acquired_count(&self) -> usize {
        self.next_id as usize
    }

    pub fn released_count(&self) -> usize {
        self.released
    }
}
