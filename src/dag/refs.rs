//! Human-readable ID → CID mappings, one file per ref.
//!
//! Filenames are URL-safe: colons in IDs become double underscores on disk
//! and are restored on listing.

use std::fs;
use std::path::PathBuf;

use cid::Cid;

use super::error::DagError;
use super::store::{cid_filename, parse_cid};

#[derive(Debug, Clone)]
pub struct RefStore {
    dir: PathBuf,
}

fn ref_filename(id: &str) -> String {
    id.replace(':', "__")
}

fn ref_id_from_filename(name: &str) -> String {
    name.replace("__", ":")
}

impl RefStore {
    pub fn new(dir: PathBuf) -> Result<Self, DagError> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn ref_path(&self, id: &str) -> PathBuf {
        self.dir.join(ref_filename(id))
    }

    /// Bind `id` to `cid`, replacing any previous binding. A plain write:
    /// refs are rebound constantly and rename semantics of the filesystem
    /// keep reads untorn.
    pub fn set(&self, id: &str, cid: &Cid) -> Result<(), DagError> {
        fs::write(self.ref_path(id), cid_filename(cid))?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Cid, DagError> {
        let data = fs::read_to_string(self.ref_path(id))
            .map_err(|_| DagError::not_found("ref", id))?;
        parse_cid(&data)
    }

    pub fn has(&self, id: &str) -> bool {
        self.ref_path(id).exists()
    }

    pub fn delete(&self, id: &str) -> Result<(), DagError> {
        fs::remove_file(self.ref_path(id)).map_err(|_| DagError::not_found("ref", id))
    }

    /// All ref IDs, sorted.
    pub fn list(&self) -> Result<Vec<String>, DagError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            ids.push(ref_id_from_filename(&entry.file_name().to_string_lossy()));
        }
        ids.sort();
        Ok(ids)
    }
}
