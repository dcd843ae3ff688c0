#![forbid(unsafe_code)]

pub mod config;
pub mod dag;
pub mod error;
pub mod feed;
mod paths;
pub mod telemetry;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::dag::{
    cid_filename, compute_cid, decode_did_key, encode_did_key, parse_cid, safe_append, safe_write,
    to_canon_json_bytes, AccessLog, CanonError, CoAccessIndex, CoChangeIndex, CommitLog,
    CommitObject, DagError, Identity, IdentityError, LinkEntry, LinkIndex, NodeEnvelope,
    ObjectStore, RefStore, RelatednessIndex, Repository, SearchIndex,
};
pub use crate::feed::{
    create_post, did_to_ipns_name, petname_from_did, sign_post, verify_post, FeedEntry, FeedError,
    FeedIndex, FeedManager, FeedSyncer, FollowEntry, IpfsError, KuboClient, MessageError, Post,
};
