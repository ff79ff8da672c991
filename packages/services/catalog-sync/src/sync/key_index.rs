use std::collections::HashSet;

use crate::models::*;
use crate::storage::CatalogStore;

/// Snapshot of the keys stored before a run begins. Read-only while streaming.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    keys: HashSet<RecordKey>,
}

impl KeyIndex {
    pub async fn load<S>(store: &S, key: &KeySpec) -> Result<Self>
    where
        S: CatalogStore + ?Sized,
    {
        let keys = store
            .find_keys(key)
            .await
            .map_err(|e| SyncError::KeyIndex(Box::new(e)))?;
        Ok(Self::from_keys(keys))
    }

    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = RecordKey>,
    {
        Self { keys: keys.into_iter().collect() }
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys known before the run that the run never saw, sorted.
    pub fn stale_keys(&self, processed: &HashSet<RecordKey>) -> Vec<RecordKey> {
        let mut stale: Vec<RecordKey> = self.keys.difference(processed).cloned().collect();
        stale.sort();
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(ks: &[&str]) -> Vec<RecordKey> {
        ks.iter().map(|k| RecordKey::from(*k)).collect()
    }

    #[test]
    fn stale_is_existing_minus_processed() {
        let index = KeyIndex::from_keys(keys(&["A", "B", "C"]));
        let processed: HashSet<RecordKey> = keys(&["B", "D"]).into_iter().collect();
        assert_eq!(index.stale_keys(&processed), keys(&["A", "C"]));
    }

    #[test]
    fn nothing_stale_when_everything_was_seen() {
        let index = KeyIndex::from_keys(keys(&["A", "B"]));
        let processed: HashSet<RecordKey> = keys(&["A", "B", "Z"]).into_iter().collect();
        assert!(index.stale_keys(&processed).is_empty());
    }

    #[test]
    fn duplicate_stored_keys_collapse() {
        let index = KeyIndex::from_keys(keys(&["A", "A", "B"]));
        assert_eq!(index.len(), 2);
        assert!(index.contains(&RecordKey::from("A")));
        assert!(!index.contains(&RecordKey::from("C")));
    }
}
