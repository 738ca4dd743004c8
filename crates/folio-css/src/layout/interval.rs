//! Sorted map from interval starts to values.
//!
//! Each key starts an interval that runs to the next key, so a lookup finds
//! the entry whose interval contains a point. Used for column balancing
//! (block offset to break point) and by the viewer (document offset to page).

/// Interval starts in ascending order, each with a value.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalMap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Default for IntervalMap<K, V> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<K: PartialOrd, V> IntervalMap<K, V> {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an interval at `key`. An existing interval with an equal key
    /// takes the new value.
    pub fn insert(&mut self, key: K, value: V) {
        let index = self.entries.partition_point(|(k, _)| *k < key);
        match self.entries.get_mut(index) {
            Some(entry) if entry.0 == key => entry.1 = value,
            _ => self.entries.insert(index, (key, value)),
        }
    }

    /// The interval containing `point`: the entry with the greatest key not
    /// above it.
    #[must_use]
    pub fn floor(&self, point: &K) -> Option<(&K, &V)> {
        let index = self.entries.partition_point(|(k, _)| k <= point);
        index.checked_sub(1).map(|i| {
            let (k, v) = &self.entries[i];
            (k, v)
        })
    }

    /// The first entry with a key at or above `point`.
    #[must_use]
    pub fn ceiling(&self, point: &K) -> Option<(&K, &V)> {
        let index = self.entries.partition_point(|(k, _)| k < point);
        self.entries.get(index).map(|(k, v)| (k, v))
    }

    /// The entry with the greatest key.
    #[must_use]
    pub fn last(&self) -> Option<(&K, &V)> {
        self.entries.last().map(|(k, v)| (k, v))
    }

    /// Drop every interval that starts after `point`.
    pub fn truncate_after(&mut self, point: &K) {
        let index = self.entries.partition_point(|(k, _)| k <= point);
        self.entries.truncate(index);
    }

    /// Number of intervals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No intervals.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_lookup() {
        let mut map = IntervalMap::new();
        map.insert(0_usize, "page 1");
        map.insert(2048, "page 3");
        map.insert(1024, "page 2");
        assert_eq!(map.floor(&0).map(|e| *e.1), Some("page 1"));
        assert_eq!(map.floor(&1500).map(|e| *e.1), Some("page 2"));
        assert_eq!(map.floor(&99_999).map(|e| *e.1), Some("page 3"));
        assert_eq!(map.ceiling(&1025).map(|e| *e.0), Some(2048));
    }

    #[test]
    fn test_float_keys_and_truncation() {
        let mut map = IntervalMap::new();
        map.insert(10.5_f32, 1);
        map.insert(20.0, 2);
        map.insert(20.0, 3);
        assert_eq!(map.len(), 2);
        assert!(map.floor(&5.0).is_none());
        assert_eq!(map.floor(&25.0).map(|e| *e.1), Some(3));
        map.truncate_after(&15.0);
        assert_eq!(map.last().map(|e| *e.1), Some(1));
    }
}
