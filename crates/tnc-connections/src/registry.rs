//! Generic connection registry (spec §3 "Connection registry", §4.1, §5).
//!
//! Mutated only under its own mutex (the global slot-table mutex never
//! protects connection state — spec §5 "Shared-resource policy"). Reads
//! return a cloned `Arc<Mutex<T>>` so a caller can hold a connection handle
//! across many operations without re-locking the registry itself, matching
//! the spec's "read handles may outlive lookups... reference-stable between
//! create and delete" guarantee.

use parking_lot::Mutex;
use std::sync::Arc;
use tnc_collections::DynArray;

pub struct ConnectionRegistry<T> {
    slots: Mutex<DynArray<Arc<Mutex<T>>>>,
}

impl<T> ConnectionRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(DynArray::default()),
        }
    }

    /// Insert at the lowest vacant index, or append (spec §3: "insertion
    /// chooses the lowest vacant index, otherwise appends").
    pub fn create(&self, value: T) -> (usize, Arc<Mutex<T>>) {
        let handle = Arc::new(Mutex::new(value));
        let id = self.slots.lock().insert(handle.clone());
        (id, handle)
    }

    pub fn get(&self, conn_id: usize) -> Option<Arc<Mutex<T>>> {
        self.slots.lock().get(conn_id).cloned()
    }

    /// Detach the connection from the registry. The caller is responsible
    /// for any plugin notification this should trigger (spec §5: a cross-
    /// crate concern this registry has no visibility into).
    pub fn delete(&self, conn_id: usize) -> Option<Arc<Mutex<T>>> {
        self.slots.lock().remove(conn_id)
    }
}

impl<T> Default for ConnectionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_reuses_lowest_vacant_index() {
        let reg: ConnectionRegistry<i32> = ConnectionRegistry::new();
        let (a, _) = reg.create(1);
        let (b, _) = reg.create(2);
        reg.delete(a);
        let (c, _) = reg.create(3);
        assert_eq!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn handle_outlives_a_fresh_lookup() {
        let reg: ConnectionRegistry<i32> = ConnectionRegistry::new();
        let (id, handle) = reg.create(10);
        *handle.lock() = 20;
        assert_eq!(*reg.get(id).unwrap().lock(), 20);
    }

    #[test]
    fn deleted_connection_is_not_found() {
        let reg: ConnectionRegistry<i32> = ConnectionRegistry::new();
        let (id, _) = reg.create(1);
        reg.delete(id);
        assert!(reg.get(id).is_none());
    }
}
