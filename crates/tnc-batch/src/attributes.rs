//! TNCS attribute store (spec §3 "Attribute store", §6 "Attribute IDs").
//!
//! Process-global by design of IF-IMV (spec §3: "Lifetime: process-global");
//! guarded by its own lock per spec §5 rather than folded under the plugin
//! host's global mutex, since attribute access is not a slot-table mutation.

use parking_lot::Mutex;
use tnc_types::AttributeId;

#[derive(Default)]
pub struct AttributeStore {
    values: Mutex<std::collections::HashMap<AttributeId, Vec<u8>>>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-setting an attribute replaces the prior value outright (spec §3:
    /// "re-set replaces prior value, shrinking allowed without reallocation"
    /// — the `HashMap` entry is simply overwritten).
    pub fn set(&self, id: AttributeId, value: Vec<u8>) {
        self.values.lock().insert(id, value);
    }

    pub fn get(&self, id: AttributeId) -> Option<Vec<u8>> {
        self.values.lock().get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_attribute_is_absent() {
        let store = AttributeStore::new();
        assert_eq!(store.get(AttributeId::ContactPort), None);
    }

    #[test]
    fn re_setting_replaces_the_prior_value() {
        let store = AttributeStore::new();
        store.set(AttributeId::PreferredLanguage, b"en".to_vec());
        store.set(AttributeId::PreferredLanguage, b"de".to_vec());
        assert_eq!(store.get(AttributeId::PreferredLanguage), Some(b"de".to_vec()));
    }
}
