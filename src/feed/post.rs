//! Signed post codec: canonical payload, sign, verify, publish, fetch.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::dag::{decode_did_key, to_canon_json_bytes, CanonError, Identity, IdentityError};

use super::ipfs::{IpfsError, KuboClient};

pub const MESSAGE_VERSION: u32 = 2;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MessageError {
    #[error("decode author DID: {0}")]
    DecodeDid(#[source] IdentityError),

    #[error("decode signature: {reason}")]
    DecodeSignature { reason: String },

    #[error("signing payload: {0}")]
    Payload(#[from] CanonError),

    #[error("decode post: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("encode post: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("signing key: {0}")]
    Key(#[from] IdentityError),

    #[error(transparent)]
    Ipfs(#[from] IpfsError),
}

/// A feed message. `refs` and `tags` are never null on the wire; absent
/// collections become empty arrays before signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub v: u32,
    #[serde(rename = "type")]
    pub post_type: String,
    pub content: String,
    pub author: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub refs: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
}

/// Peers may serialize empty collections as `null`; treat that as empty.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Build an unsigned post stamped with the current time.
pub fn create_post(did: &str, content: &str, refs: Vec<String>, tags: Vec<String>) -> Post {
    Post {
        v: MESSAGE_VERSION,
        post_type: "post".to_string(),
        content: content.to_string(),
        author: did.to_string(),
        refs,
        tags,
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        signature: String::new(),
    }
}

/// The canonical bytes that get signed: every field except `signature`,
/// sorted keys, compact separators, empty arrays never null. Must stay
/// byte-identical across implementations or signatures stop verifying.
fn signing_payload(post: &Post) -> Result<Vec<u8>, CanonError> {
    let payload = json!({
        "v": post.v,
        "type": post.post_type,
        "content": post.content,
        "author": post.author,
        "refs": post.refs,
        "tags": post.tags,
        "timestamp": post.timestamp,
    });
    to_canon_json_bytes(&payload)
}

/// Sign a post, returning a copy with the base64 signature set.
pub fn sign_post(post: &Post, key: &SigningKey) -> Result<Post, MessageError> {
    let payload = signing_payload(post)?;
    let signature = key.sign(&payload);

    let mut signed = post.clone();
    signed.signature = STANDARD.encode(signature.to_bytes());
    Ok(signed)
}

/// Verify a post's signature against its author DID.
///
/// An absent signature is `Ok(false)`; a present-but-invalid signature is
/// also `Ok(false)`. Only undecodable inputs produce errors.
pub fn verify_post(post: &Post) -> Result<bool, MessageError> {
    if post.signature.is_empty() {
        return Ok(false);
    }

    let public_key = decode_did_key(&post.author).map_err(MessageError::DecodeDid)?;
    let verify_key = VerifyingKey::from_bytes(&public_key)
        .map_err(|err| MessageError::DecodeDid(IdentityError::Key(err)))?;

    let signature_bytes = STANDARD
        .decode(&post.signature)
        .map_err(|err| MessageError::DecodeSignature {
            reason: err.to_string(),
        })?;
    let signature_bytes: [u8; 64] =
        signature_bytes
            .try_into()
            .map_err(|_| MessageError::DecodeSignature {
                reason: "signature must be 64 bytes".to_string(),
            })?;
    let signature = Signature::from_bytes(&signature_bytes);

    let payload = signing_payload(post)?;
    Ok(verify_key.verify(&payload, &signature).is_ok())
}

/// Create, sign, add, and pin a post. Returns its CID.
pub fn publish(
    kubo: &KuboClient,
    identity: &Identity,
    content: &str,
    refs: Vec<String>,
    tags: Vec<String>,
) -> Result<String, MessageError> {
    let post = create_post(&identity.did, content, refs, tags);
    let key = identity.signing_key()?;
    let signed = sign_post(&post, &key)?;

    let data = serde_json::to_vec(&signed).map_err(MessageError::Encode)?;
    let cid = kubo.add(data)?;
    kubo.pin(&cid)?;
    Ok(cid)
}

/// Fetch a post by CID and verify its signature. Verification errors keep
/// the post but report it unverified.
pub fn fetch(kubo: &KuboClient, cid: &str) -> Result<(Post, bool), MessageError> {
    let data = kubo.cat(cid)?;
    let post: Post = serde_json::from_slice(&data).map_err(MessageError::Decode)?;

    match verify_post(&post) {
        Ok(verified) => Ok((post, verified)),
        Err(_) => Ok((post, false)),
    }
}
