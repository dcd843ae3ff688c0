//! Federated feed layer: signed posts, follow lists, and IPNS-published
//! feed indexes over a local IPFS daemon.

mod ipfs;
mod manager;
mod petnames;
mod post;
mod sync;

pub use ipfs::{IpfsError, KeyInfo, KuboClient};
pub use manager::{
    did_to_ipns_name, FeedEntry, FeedError, FeedIndex, FeedManager, FollowEntry, KEY_NAME,
    MAX_FEED_ENTRIES,
};
pub use petnames::petname_from_did;
pub use post::{create_post, fetch, publish, sign_post, verify_post, MessageError, Post};
pub use sync::{FeedSyncer, DEFAULT_SYNC_INTERVAL};
