//! Vacancy-reusing dynamic sequence used by the connection registry (spec
//! §2 C2, §3 "insertion chooses the lowest vacant index, otherwise appends").

pub struct DynArray<T> {
    items: Vec<Option<T>>,
}

impl<T> Default for DynArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DynArray<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Insert at the lowest vacant index, or append. Returns that index.
    pub fn insert(&mut self, value: T) -> usize {
        if let Some(idx) = self.items.iter().position(Option::is_none) {
            self.items[idx] = Some(value);
            idx
        } else {
            self.items.push(Some(value));
            self.items.len() - 1
        }
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.items.get(idx).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.items.get_mut(idx).and_then(|s| s.as_mut())
    }

    /// Vacate the slot at `idx`, returning its previous value if any.
    pub fn remove(&mut self, idx: usize) -> Option<T> {
        self.items.get_mut(idx).and_then(|s| s.take())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reuses_lowest_vacant_index() {
        let mut a = DynArray::new();
        let i0 = a.insert("x");
        let i1 = a.insert("y");
        a.remove(i0);
        let i2 = a.insert("z");
        assert_eq!(i2, i0);
        assert_eq!(a.get(i1), Some(&"y"));
    }

    #[test]
    fn insert_appends_when_no_vacancy() {
        let mut a: DynArray<i32> = DynArray::new();
        assert_eq!(a.insert(1), 0);
        assert_eq!(a.insert(2), 1);
    }
}
