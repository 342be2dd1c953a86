//! JSON lines entity store
//!
//! Each entity kind lives in `<dir>/<kind>.jsonl`, one serialized
//! [`StoredEntity`] per line. Upserts append; on read the last line for an id
//! wins. Deletes write the surviving entities to a staging file in the same
//! directory and rename it over the data file, so a failed rewrite leaves the
//! old file in place. Index declarations are kept in `<dir>/<kind>.indexes.json`.

use super::entity_store::{EntityStore, Filter, Pagination, StoredEntity};
use crate::constants::JSONL_EXTENSION;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

/// Append-only JSON lines store rooted at a directory
#[derive(Debug)]
pub struct JsonLinesEntityStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesEntityStore {
    /// Open (and create if needed) a store directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::io(format!("Failed to create store directory {}", dir.display()), e)
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the data file for `kind`
    pub fn kind_path(&self, kind: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", kind, JSONL_EXTENSION))
    }

    fn index_path(&self, kind: &str) -> PathBuf {
        self.dir.join(format!("{}.indexes.json", kind))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| Error::persistence("store write lock poisoned"))
    }

    /// Current state of `kind`, last write per id
    fn load(&self, kind: &str) -> Result<BTreeMap<String, StoredEntity>> {
        let path = self.kind_path(kind);
        let mut entities = BTreeMap::new();
        if !path.exists() {
            return Ok(entities);
        }

        let file = File::open(&path)
            .map_err(|e| Error::io(format!("Failed to open {}", path.display()), e))?;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line =
                line.map_err(|e| Error::io(format!("Failed to read {}", path.display()), e))?;
            if line.trim().is_empty() {
                continue;
            }
            let entity: StoredEntity = serde_json::from_str(&line).map_err(|e| {
                Error::serialization(
                    format!("Corrupt line {} in {}", number + 1, path.display()),
                    e,
                )
            })?;
            entities.insert(entity.id.clone(), entity);
        }
        Ok(entities)
    }

    fn append(&self, kind: &str, entities: &[StoredEntity]) -> Result<()> {
        let path = self.kind_path(kind);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(format!("Failed to open {}", path.display()), e))?;

        let mut writer = BufWriter::new(file);
        write_lines(&mut writer, entities)?;
        writer
            .flush()
            .map_err(|e| Error::io(format!("Failed to write {}", path.display()), e))
    }
}

fn write_lines<W: Write>(writer: &mut W, entities: &[StoredEntity]) -> Result<()> {
    for entity in entities {
        serde_json::to_writer(&mut *writer, entity)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Replace `target` with `entities`, staged in `staging_dir`
///
/// `target` is untouched unless every line was written and flushed.
fn replace_contents(staging_dir: &Path, target: &Path, entities: &[StoredEntity]) -> Result<()> {
    let staged = NamedTempFile::new_in(staging_dir).map_err(|e| {
        Error::io(format!("Failed to stage rewrite of {}", target.display()), e)
    })?;

    let mut writer = BufWriter::new(staged);
    write_lines(&mut writer, entities)?;
    let staged = writer.into_inner().map_err(|e| {
        Error::io(format!("Failed to stage rewrite of {}", target.display()), e.into_error())
    })?;

    staged
        .persist(target)
        .map_err(|e| Error::io(format!("Failed to replace {}", target.display()), e.error))?;
    Ok(())
}

impl EntityStore for JsonLinesEntityStore {
    fn bulk_upsert(&self, entities: Vec<StoredEntity>) -> Result<usize> {
        let written = entities.len();
        let mut by_kind: HashMap<String, Vec<StoredEntity>> = HashMap::new();
        for entity in entities {
            by_kind.entry(entity.kind.clone()).or_default().push(entity);
        }

        let _guard = self.lock()?;
        for (kind, group) in &by_kind {
            self.append(kind, group)?;
            debug!("Appended {} {} entities", group.len(), kind);
        }
        Ok(written)
    }

    fn query(
        &self,
        kind: &str,
        filter: &Filter,
        pagination: Pagination,
    ) -> Result<Vec<StoredEntity>> {
        let _guard = self.lock()?;
        let entities = self.load(kind)?;
        Ok(pagination.apply(entities.into_values().filter(|entity| filter.matches(entity))))
    }

    fn delete(&self, kind: &str, ids: &[String]) -> Result<usize> {
        let _guard = self.lock()?;
        let mut entities = self.load(kind)?;
        let removed = ids.iter().filter(|id| entities.remove(*id).is_some()).count();
        if removed == 0 {
            return Ok(0);
        }

        let survivors: Vec<StoredEntity> = entities.into_values().collect();
        replace_contents(&self.dir, &self.kind_path(kind), &survivors)?;
        debug!("Deleted {} {} entities, {} remain", removed, kind, survivors.len());
        Ok(removed)
    }

    fn ensure_index(&self, kind: &str, fields: &[&str]) -> Result<()> {
        let _guard = self.lock()?;
        let path = self.index_path(kind);
        let mut indexes: BTreeSet<Vec<String>> = if path.exists() {
            let text = fs::read_to_string(&path)
                .map_err(|e| Error::io(format!("Failed to read {}", path.display()), e))?;
            serde_json::from_str(&text)?
        } else {
            BTreeSet::new()
        };

        if indexes.insert(fields.iter().map(|field| field.to_string()).collect()) {
            fs::write(&path, serde_json::to_string_pretty(&indexes)?)
                .map_err(|e| Error::io(format!("Failed to write {}", path.display()), e))?;
            debug!("Declared index {:?} on {}", fields, kind);
        }
        Ok(())
    }
}
