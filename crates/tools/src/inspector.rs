use statekeep_persist::Backend;
use statekeep_store::{Dispatcher, StateEntry, Store};
use std::time::{SystemTime, UNIX_EPOCH};

/// Store inspector for developer tooling.
///
/// Read-only queries against the in-memory state for debugging. Nothing here
/// falls back to the backend or evicts expired entries.
pub struct StoreInspector;

impl StoreInspector {
    /// Produce a summary of the store state.
    pub fn summary<D: Dispatcher, B: Backend>(store: &Store<D, B>) -> StoreSummary {
        let now = SystemTime::now();
        let mut summary = StoreSummary {
            entries: store.len(),
            backend_rows: store.backend().len(),
            ..Default::default()
        };
        for (_, entry) in store.entries() {
            summary.observers += entry.observer_count();
            summary.persistent += usize::from(entry.is_persistent());
            summary.encrypted += usize::from(entry.is_encrypted());
            summary.expiring += usize::from(entry.expires_at().is_some());
            summary.expired += usize::from(entry.is_expired(now));
        }
        summary
    }

    /// Describe a single in-memory entry.
    pub fn inspect_key<D: Dispatcher, B: Backend>(
        store: &Store<D, B>,
        key: &str,
    ) -> Option<EntryInfo> {
        store.entry(key).map(|entry| EntryInfo::new(key, entry, store.dispatcher()))
    }

    /// List all in-memory keys, sorted.
    pub fn list_keys<D: Dispatcher, B: Backend>(store: &Store<D, B>) -> Vec<String> {
        store.keys().map(str::to_string).collect()
    }
}

/// Summary of store state for the inspector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub entries: usize,
    pub observers: usize,
    pub persistent: usize,
    pub encrypted: usize,
    pub expiring: usize,
    /// Expired but not yet swept.
    pub expired: usize,
    pub backend_rows: usize,
}

impl std::fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Store: entries={} observers={} persistent={} encrypted={} expiring={} expired={} rows={}",
            self.entries,
            self.observers,
            self.persistent,
            self.encrypted,
            self.expiring,
            self.expired,
            self.backend_rows
        )
    }
}

/// Detailed info about a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: String,
    /// Stored type, or `unset`/`empty`.
    pub value_type: &'static str,
    pub persistent: bool,
    pub encrypted: bool,
    pub expires_at: Option<SystemTime>,
    pub observers: usize,
    /// Observers that would receive the next delivery.
    pub live_observers: usize,
}

impl EntryInfo {
    fn new<D: Dispatcher>(key: &str, entry: &StateEntry, dispatcher: &D) -> Self {
        Self {
            key: key.to_string(),
            value_type: entry.value().type_name(),
            persistent: entry.is_persistent(),
            encrypted: entry.is_encrypted(),
            expires_at: entry.expires_at(),
            observers: entry.observer_count(),
            live_observers: entry
                .observers()
                .iter()
                .filter(|o| o.is_observing(dispatcher))
                .count(),
        }
    }
}

impl std::fmt::Display for EntryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} type={}", self.key, self.value_type)?;
        if self.persistent {
            f.write_str(if self.encrypted { " persist+encrypt" } else { " persist" })?;
        }
        if let Some(at) = self.expires_at {
            let secs = at.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
            write!(f, " expires_at={secs}")?;
        }
        write!(f, " observers={}/{}", self.live_observers, self.observers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statekeep_persist::MemoryBackend;
    use statekeep_store::{Binding, SetOption};
    use statekeep_tree::TreeHandle;
    use std::time::Duration;

    fn make_store() -> (TreeHandle, statekeep_common::ElementId, Store<TreeHandle>) {
        let (tree, root) = TreeHandle::with_root("div");
        (tree.clone(), root, Store::new(tree, MemoryBackend::new()))
    }

    #[test]
    fn summary_empty_store() {
        let (_tree, _root, store) = make_store();
        let summary = StoreInspector::summary(&store);
        assert_eq!(summary, StoreSummary::default());
    }

    #[test]
    fn summary_counts_policies() {
        let (_tree, root, mut store) = make_store();
        store.set("/a", 1);
        store.set_with("/b", 2, &[SetOption::Persist]);
        store.set_with(
            "/c",
            3,
            &[SetOption::Encrypt, SetOption::ExpiresIn(Duration::from_secs(60))],
        );
        store.observe("/a", root).value(&Binding::new(0));

        let summary = StoreInspector::summary(&store);
        assert_eq!(summary.entries, 3);
        assert_eq!(summary.observers, 1);
        assert_eq!(summary.persistent, 2);
        assert_eq!(summary.encrypted, 1);
        assert_eq!(summary.expiring, 1);
        assert_eq!(summary.expired, 0);
        assert_eq!(summary.backend_rows, 3); // 2 values + identity row
    }

    #[test]
    fn inspect_key_found() {
        let (tree, root, mut store) = make_store();
        let child = tree.borrow_mut().mount_child(root, "p").unwrap();
        store.set_with("/k", 42u32, &[SetOption::Persist]);
        store.observe("/k", root).value(&Binding::new(0u32));
        store.observe("/k", child).value(&Binding::new(0u32));
        tree.borrow_mut().dismount(child);

        let info = StoreInspector::inspect_key(&store, "/k").unwrap();
        assert_eq!(info.value_type, "u32");
        assert!(info.persistent);
        assert!(!info.encrypted);
        assert_eq!(info.observers, 2);
        assert_eq!(info.live_observers, 1);
        assert!(info.to_string().contains("observers=1/2"));
    }

    #[test]
    fn inspect_key_not_found() {
        let (_tree, _root, store) = make_store();
        assert!(StoreInspector::inspect_key(&store, "/missing").is_none());
    }

    #[test]
    fn observed_only_key_is_unset() {
        let (_tree, root, mut store) = make_store();
        store.observe("/k", root).value(&Binding::new(0));
        let info = StoreInspector::inspect_key(&store, "/k").unwrap();
        assert_eq!(info.value_type, "unset");
    }

    #[test]
    fn list_keys_sorted() {
        let (_tree, _root, mut store) = make_store();
        store.set("/b", 1);
        store.set("/a", 1);
        assert_eq!(StoreInspector::list_keys(&store), vec!["/a", "/b"]);
    }

    #[test]
    fn summary_display() {
        let (_tree, _root, store) = make_store();
        let s = format!("{}", StoreInspector::summary(&store));
        assert!(s.contains("entries=0"));
    }
}
