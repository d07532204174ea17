//! File-backed persistence for the rotation engine.
//!
//! Two JSON documents under one data directory: `catalog.json` (the
//! map definitions, including dynamically discovered ones) and
//! `cooldowns.json` (remaining cooldown cycles per map). Writes go to
//! a temp file first and rename into place, so a crash mid-write never
//! leaves a torn document.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use rotavote_core::{Catalog, CatalogStore, CooldownLedger, MapDefinition};

/// Errors from loading or saving engine state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed store file: {0}")]
    Malformed(#[from] serde_json::Error),
}

const CATALOG_FILE: &str = "catalog.json";
const COOLDOWNS_FILE: &str = "cooldowns.json";

/// JSON-file store rooted at a data directory.
///
/// Keeps an in-memory mirror of the catalog so `persist_map` can
/// rewrite the whole document without re-reading it.
pub struct FileStore {
    catalog_path: PathBuf,
    cooldowns_path: PathBuf,
    catalog: Catalog,
}

impl FileStore {
    /// Opens (creating if needed) the data directory and loads the
    /// catalog mirror. Missing files read as empty state.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut store = Self {
            catalog_path: dir.join(CATALOG_FILE),
            cooldowns_path: dir.join(COOLDOWNS_FILE),
            catalog: Catalog::default(),
        };
        store.catalog = store.load_catalog()?;
        Ok(store)
    }

    pub fn load_catalog(&self) -> Result<Catalog, StoreError> {
        match fs::read(&self.catalog_path) {
            Ok(bytes) => {
                let defs: Vec<MapDefinition> = serde_json::from_slice(&bytes)?;
                debug!(maps = defs.len(), path = %self.catalog_path.display(), "catalog loaded");
                Ok(Catalog::new(defs))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Catalog::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn load_cooldowns(&self) -> Result<CooldownLedger, StoreError> {
        match fs::read(&self.cooldowns_path) {
            Ok(bytes) => {
                let remaining = serde_json::from_slice(&bytes)?;
                Ok(CooldownLedger::from_map(remaining))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(CooldownLedger::new()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save_catalog(&self, catalog: &Catalog) -> Result<(), StoreError> {
        let defs: Vec<&MapDefinition> = catalog.iter().collect();
        let json = serde_json::to_vec_pretty(&defs)?;
        write_atomic(&self.catalog_path, &json)?;
        debug!(maps = defs.len(), "catalog saved");
        Ok(())
    }

    pub fn save_cooldowns(&self, cooldowns: &CooldownLedger) -> Result<(), StoreError> {
        // BTreeMap for a stable field order in the file
        let remaining: BTreeMap<&str, u32> = cooldowns.iter().collect();
        let json = serde_json::to_vec_pretty(&remaining)?;
        write_atomic(&self.cooldowns_path, &json)?;
        Ok(())
    }
}

impl CatalogStore for FileStore {
    fn persist_map(&mut self, def: &MapDefinition) {
        self.catalog.insert(def.clone());
        if let Err(err) = self.save_catalog(&self.catalog) {
            warn!(map = %def.id, %err, "failed to persist map definition");
        }
    }

    fn persist_cooldowns(&mut self, cooldowns: &CooldownLedger) {
        if let Err(err) = self.save_cooldowns(cooldowns) {
            warn!(%err, "failed to persist cooldowns");
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_files_read_as_empty_state() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.load_catalog().unwrap().is_empty());
        assert!(store.load_cooldowns().unwrap().is_empty());
    }

    #[test]
    fn catalog_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let mut surf = MapDefinition::new("surf_utopia");
        surf.workshop = true;
        surf.workshop_id = Some("3129698096".into());
        surf.cooldown_cycles = 4;
        let catalog = Catalog::new([MapDefinition::new("de_dust2"), surf]);
        store.save_catalog(&catalog).unwrap();

        let loaded = store.load_catalog().unwrap();
        assert_eq!(loaded.len(), 2);
        let surf = loaded.get("surf_utopia").unwrap();
        assert!(surf.workshop);
        assert_eq!(surf.workshop_id.as_deref(), Some("3129698096"));
        assert_eq!(surf.cooldown_cycles, 4);
    }

    #[test]
    fn cooldowns_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let mut cooldowns = CooldownLedger::new();
        cooldowns.reset("de_nuke", 3);
        cooldowns.reset("de_train", 1);
        store.save_cooldowns(&cooldowns).unwrap();

        let loaded = store.load_cooldowns().unwrap();
        assert_eq!(loaded.remaining("de_nuke"), 3);
        assert_eq!(loaded.remaining("de_train"), 1);
        assert_eq!(loaded.remaining("de_dust2"), 0);
    }

    #[test]
    fn persist_map_accumulates_discoveries() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();

        store.persist_map(&MapDefinition::discovered("surf_one", Some("1"), 10));
        store.persist_map(&MapDefinition::discovered("surf_two", None, 10));

        // reopen from disk
        let reopened = FileStore::open(dir.path()).unwrap();
        let catalog = reopened.load_catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("surf_one").unwrap().workshop);
        assert!(!catalog.get("surf_two").unwrap().workshop);
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let mut cooldowns = CooldownLedger::new();
        cooldowns.reset("a", 5);
        store.save_cooldowns(&cooldowns).unwrap();

        store.save_cooldowns(&CooldownLedger::new()).unwrap();
        assert!(store.load_cooldowns().unwrap().is_empty());
    }

    #[test]
    fn malformed_catalog_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("catalog.json"), b"{ not json").unwrap();
        assert!(matches!(
            FileStore::open(dir.path()),
            Err(StoreError::Malformed(_))
        ));
    }
}
