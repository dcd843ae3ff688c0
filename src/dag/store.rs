//! CID-addressed immutable object store.

use std::fs;
use std::path::PathBuf;

use cid::Cid;
use multihash::Multihash;
use sha2::{Digest, Sha256};

use super::error::DagError;
use super::safefile::safe_write;

/// Multicodec for raw bytes.
const RAW_CODEC: u64 = 0x55;
/// Multihash code for SHA2-256.
const SHA2_256: u64 = 0x12;

/// Compute the CIDv1 (raw codec, SHA2-256) of `data`.
pub fn compute_cid(data: &[u8]) -> Cid {
    let digest = Sha256::digest(data);
    let hash = Multihash::wrap(SHA2_256, &digest).expect("sha-256 digest fits in a multihash");
    Cid::new_v1(RAW_CODEC, hash)
}

/// Textual form of a CID: lowercase base32 multibase, used as the object
/// filename and everywhere a CID appears in serialized state.
pub fn cid_filename(cid: &Cid) -> String {
    // CIDv1 Display is base32lower multibase ("b...")
    cid.to_string()
}

/// Parse a textual (multibase) CID.
pub fn parse_cid(s: &str) -> Result<Cid, DagError> {
    Cid::try_from(s.trim()).map_err(|err| DagError::decode("cid", err))
}

/// Content-addressed blob store: one file per object, named by CID.
///
/// Object bytes are determined by their CID; nothing is ever rewritten in
/// place.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    dir: PathBuf,
}

impl ObjectStore {
    pub fn new(dir: PathBuf) -> Result<Self, DagError> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn object_path(&self, cid: &Cid) -> PathBuf {
        self.dir.join(cid_filename(cid))
    }

    /// Store `data`, returning its CID. No-op when the object already
    /// exists.
    pub fn put(&self, data: &[u8]) -> Result<Cid, DagError> {
        let cid = compute_cid(data);
        let path = self.object_path(&cid);
        if path.exists() {
            return Ok(cid);
        }
        safe_write(&path, data, 0o644)?;
        Ok(cid)
    }

    pub fn get(&self, cid: &Cid) -> Result<Vec<u8>, DagError> {
        let path = self.object_path(cid);
        fs::read(&path).map_err(|_| DagError::not_found("object", cid_filename(cid)))
    }

    pub fn has(&self, cid: &Cid) -> bool {
        self.object_path(cid).exists()
    }
}
