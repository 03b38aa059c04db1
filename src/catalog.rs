//! The seam between this crate and the game's asset library.
//!
//! The real asset repository lives outside this crate; everything here talks to it
//! through the [`AssetCatalog`] trait. Row reads hand out copies, and writes go
//! back through `put_*` so implementations keep ownership of their sheets.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use crate::language::Language;

/// A deferred reference to a datacenter row, resolved against the catalog later.
/// The language tag decides which localised sheet the resolution reads from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DataCenterRef {
    pub id: u32,
    pub language: Language,
}

/// One row of the world sheet.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct WorldRecord {
    pub id: u32,
    pub name: String,

    /// Whether the world shows up in public server lists.
    pub is_public: bool,

    /// The datacenter this world belongs to.
    pub datacenter: Option<DataCenterRef>,
}

/// One row of the datacenter sheet.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DataCenterRecord {
    pub id: u32,
    pub name: String,

    /// Numeric deployment region code.
    pub region: u8,
}

/// Access to the game's asset data: typed sheet rows, raw file blobs, and the
/// repository's queue of resource loads awaiting processing.
pub trait AssetCatalog: Send + Sync {
    /// Returns a copy of the world row with the given id, if it exists.
    fn world(&self, id: u32) -> Option<WorldRecord>;

    /// Returns a copy of the datacenter row with the given id, if it exists.
    fn datacenter(&self, id: u32) -> Option<DataCenterRecord>;

    /// Writes a world row back into the sheet, replacing any row with the same id.
    fn put_world(&self, row: WorldRecord);

    /// Writes a datacenter row back into the sheet, replacing any row with the
    /// same id.
    fn put_datacenter(&self, row: DataCenterRecord);

    /// Returns the raw bytes of the file at `path`, if it exists.
    fn file(&self, path: &str) -> Option<Vec<u8>>;

    /// Returns true if a file exists at `path`.
    fn file_exists(&self, path: &str) -> bool;

    /// Returns true if the repository has resource loads waiting to be processed.
    fn has_pending_loads(&self) -> bool;

    /// Processes every resource load currently queued.
    fn drain_pending_loads(&self);
}

/// An [`AssetCatalog`] backed by in-memory maps. Hosts that preload their sheets
/// use this directly, and it stands in for the real repository in tests.
#[derive(Default)]
pub struct MemoryCatalog {
    worlds: Mutex<HashMap<u32, WorldRecord>>,
    datacenters: Mutex<HashMap<u32, DataCenterRecord>>,
    files: Mutex<HashMap<String, Vec<u8>>>,

    /// Loads that have been requested but not yet made visible in `files`.
    pending: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryCatalog {
    pub fn new() -> MemoryCatalog {
        MemoryCatalog::default()
    }

    pub fn insert_world(&self, row: WorldRecord) {
        self.lock_worlds().insert(row.id, row);
    }

    pub fn insert_datacenter(&self, row: DataCenterRecord) {
        self.lock_datacenters().insert(row.id, row);
    }

    pub fn insert_file(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.lock_files().insert(path.into(), bytes);
    }

    /// Queues a file load. The file only becomes visible once the pending queue is
    /// drained.
    pub fn queue_load(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.lock_pending().push((path.into(), bytes));
    }

    fn lock_worlds(&self) -> MutexGuard<'_, HashMap<u32, WorldRecord>> {
        self.worlds.lock().expect("world sheet lock poisoned")
    }

    fn lock_datacenters(&self) -> MutexGuard<'_, HashMap<u32, DataCenterRecord>> {
        self.datacenters
            .lock()
            .expect("datacenter sheet lock poisoned")
    }

    fn lock_files(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.files.lock().expect("file map lock poisoned")
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<(String, Vec<u8>)>> {
        self.pending.lock().expect("pending queue lock poisoned")
    }
}

impl AssetCatalog for MemoryCatalog {
    fn world(&self, id: u32) -> Option<WorldRecord> {
        self.lock_worlds().get(&id).cloned()
    }

    fn datacenter(&self, id: u32) -> Option<DataCenterRecord> {
        self.lock_datacenters().get(&id).cloned()
    }

    fn put_world(&self, row: WorldRecord) {
        self.lock_worlds().insert(row.id, row);
    }

    fn put_datacenter(&self, row: DataCenterRecord) {
        self.lock_datacenters().insert(row.id, row);
    }

    fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock_files().get(path).cloned()
    }

    fn file_exists(&self, path: &str) -> bool {
        self.lock_files().contains_key(path)
    }

    fn has_pending_loads(&self) -> bool {
        !self.lock_pending().is_empty()
    }

    fn drain_pending_loads(&self) {
        let drained: Vec<_> = self.lock_pending().drain(..).collect();

        // The file map lock is taken after the queue lock is released.
        let mut files = self.lock_files();

        for (path, bytes) in drained {
            files.insert(path, bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drained_loads_become_visible() {
        let catalog = MemoryCatalog::new();

        catalog.queue_load("chara/model.mdl", vec![1, 2, 3]);
        assert!(catalog.has_pending_loads());
        assert!(!catalog.file_exists("chara/model.mdl"));

        catalog.drain_pending_loads();
        assert!(!catalog.has_pending_loads());
        assert_eq!(catalog.file("chara/model.mdl"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn put_replaces_rows_by_id() {
        let catalog = MemoryCatalog::new();

        catalog.insert_datacenter(DataCenterRecord {
            id: 101,
            name: "Elemental".into(),
            region: 1,
        });

        catalog.put_datacenter(DataCenterRecord {
            id: 101,
            name: "Gaia".into(),
            region: 2,
        });

        let row = catalog.datacenter(101).unwrap();
        assert_eq!(row.name, "Gaia");
        assert_eq!(row.region, 2);
    }
}
