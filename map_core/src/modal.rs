//! Registry of open plant detail modals
//!
//! Tracks identity and lifecycle only; drawing a modal is up to the factory
//! passed to [`ModalRegistry::render_with`].

use tracing::debug;

/// Registry-assigned modal id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModalId(u64);

impl ModalId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// An open modal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalEntry {
    pub id: ModalId,
    pub plant_id: String,
}

/// Open modals, at most one per plant
#[derive(Debug, Default)]
pub struct ModalRegistry {
    entries: Vec<ModalEntry>,
    next_id: u64,
}

impl ModalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the modal for `plant_id`. If one is already open, nothing
    /// changes and its id is returned.
    pub fn open_modal(&mut self, plant_id: &str) -> ModalId {
        if let Some(existing) = self.entries.iter().find(|e| e.plant_id == plant_id) {
            return existing.id;
        }
        self.next_id += 1;
        let id = ModalId(self.next_id);
        self.entries.push(ModalEntry {
            id,
            plant_id: plant_id.to_string(),
        });
        debug!("Opened modal {} for {}", id.0, plant_id);
        id
    }

    /// Close by registry id. Returns `false` if no such modal was open.
    pub fn close_modal(&mut self, id: ModalId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn close_all_modals(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[ModalEntry] {
        &self.entries
    }

    pub fn is_open(&self, plant_id: &str) -> bool {
        self.entries.iter().any(|e| e.plant_id == plant_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invoke `factory` once per open modal, in opening order.
    pub fn render_with<R>(&self, mut factory: impl FnMut(&ModalEntry) -> R) -> Vec<R> {
        self.entries.iter().map(|e| factory(e)).collect()
    }
}
