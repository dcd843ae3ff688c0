//! Ed25519 identity and the did:key codec.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{SigningKey, VerifyingKey};
use multibase::Base;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::error::IdentityError;
use super::safefile::safe_write;
use crate::paths;

const DID_KEY_PREFIX: &str = "did:key:z";

/// Multicodec prefix for Ed25519 public keys.
const ED25519_MULTICODEC: [u8; 2] = [0xED, 0x01];

/// An Ed25519 keypair and its derived DID, as stored on disk. Key material
/// is standard base64: a 32-byte seed and a 32-byte public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub did: String,
    pub public_key: String,
    pub private_key: String,
}

impl Identity {
    /// Read the shared identity file, generating a new identity if none
    /// exists. A corrupt file is a fatal error, not silently replaced.
    pub fn load() -> Result<Self, IdentityError> {
        let path = paths::identity_path().ok_or(IdentityError::NoHome)?;
        Self::load_or_generate_at(&path)
    }

    pub fn load_or_generate_at(path: &Path) -> Result<Self, IdentityError> {
        match fs::read(path) {
            Ok(data) => serde_json::from_slice(&data).map_err(IdentityError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::generate_at(path),
            Err(err) => Err(err.into()),
        }
    }

    /// Generate a fresh keypair and persist it at `path` with 0600
    /// permissions.
    pub fn generate_at(path: &Path) -> Result<Self, IdentityError> {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);

        let signing_key = SigningKey::from_bytes(&seed);
        let public_key = signing_key.verifying_key();
        let did = encode_did_key(public_key.as_bytes());

        let identity = Identity {
            did,
            public_key: STANDARD.encode(public_key.as_bytes()),
            private_key: STANDARD.encode(seed),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&identity)
            .map_err(IdentityError::Parse)?;
        safe_write(path, &data, 0o600)?;

        tracing::info!("generated new identity {}", identity.did);
        tracing::info!("stored at {}", path.display());
        Ok(identity)
    }

    fn decode_key_material(encoded: &str) -> Result<[u8; 32], IdentityError> {
        let bytes = STANDARD.decode(encoded)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| IdentityError::KeyLength(len))
    }

    /// The Ed25519 private key derived from the stored seed.
    pub fn signing_key(&self) -> Result<SigningKey, IdentityError> {
        Ok(SigningKey::from_bytes(&Self::decode_key_material(
            &self.private_key,
        )?))
    }

    /// The Ed25519 public key.
    pub fn verify_key(&self) -> Result<VerifyingKey, IdentityError> {
        Ok(VerifyingKey::from_bytes(&Self::decode_key_material(
            &self.public_key,
        )?)?)
    }
}

/// Encode a raw Ed25519 public key as `did:key:z...`: base58btc over the
/// multicodec-prefixed key bytes. Leading zero bytes become leading `1`s.
pub fn encode_did_key(public_key: &[u8]) -> String {
    let mut prefixed = Vec::with_capacity(2 + public_key.len());
    prefixed.extend_from_slice(&ED25519_MULTICODEC);
    prefixed.extend_from_slice(public_key);
    format!("did:key:{}", multibase::encode(Base::Base58Btc, &prefixed))
}

/// Decode a `did:key:z...` string to the raw 32-byte Ed25519 public key.
pub fn decode_did_key(did: &str) -> Result<[u8; 32], IdentityError> {
    if !did.starts_with(DID_KEY_PREFIX) {
        return Err(IdentityError::InvalidDid(did.to_string()));
    }
    // multibase wants the 'z' discriminator attached
    let encoded = &did["did:key:".len()..];
    let (_base, decoded) =
        multibase::decode(encoded).map_err(|_| IdentityError::InvalidBase58)?;

    // left-pad to multicodec (2) + key (32) bytes
    let mut prefixed = decoded;
    if prefixed.len() < 34 {
        let mut padded = vec![0u8; 34 - prefixed.len()];
        padded.extend_from_slice(&prefixed);
        prefixed = padded;
    }

    if prefixed[..2] != ED25519_MULTICODEC {
        return Err(IdentityError::WrongMulticodec);
    }

    let key = &prefixed[2..];
    let len = key.len();
    key.try_into().map_err(|_| IdentityError::KeyLength(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, Verifier};
    use tempfile::TempDir;

    // Vectors generated with a deterministic seed of bytes 0..32.
    const TEST_SEED_B64: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";
    const TEST_PUBKEY_B64: &str = "A6EHv/POEL4dcN0Y50vAmWfk1jCbpQ1fHdyGZBJVMbg=";
    const TEST_DID: &str = "did:key:z6MkehRgf7yJbgaGfYsdoAsKdBPE3dj2CYhowQdcjqSJgvVd";

    fn test_identity() -> Identity {
        Identity {
            did: TEST_DID.to_string(),
            public_key: TEST_PUBKEY_B64.to_string(),
            private_key: TEST_SEED_B64.to_string(),
        }
    }

    #[test]
    fn encode_did_key_known_vector() {
        let public_key = STANDARD.decode(TEST_PUBKEY_B64).unwrap();
        assert_eq!(encode_did_key(&public_key), TEST_DID);
    }

    #[test]
    fn decode_did_key_known_vector() {
        let decoded = decode_did_key(TEST_DID).unwrap();
        let want = STANDARD.decode(TEST_PUBKEY_B64).unwrap();
        assert_eq!(decoded.as_slice(), want.as_slice());
    }

    #[test]
    fn did_roundtrip_for_fresh_key() {
        let mut seed = [7u8; 32];
        OsRng.fill_bytes(&mut seed);
        let public_key = SigningKey::from_bytes(&seed).verifying_key();

        let did = encode_did_key(public_key.as_bytes());
        assert!(did.starts_with(DID_KEY_PREFIX));
        assert_eq!(decode_did_key(&did).unwrap(), *public_key.as_bytes());
    }

    #[test]
    fn decode_rejects_bad_inputs() {
        assert!(matches!(
            decode_did_key("bad:key:z123"),
            Err(IdentityError::InvalidDid(_))
        ));
        assert!(decode_did_key("did:key:z").is_err());
        // '0', 'O', 'I', 'l' are outside the base58btc alphabet
        assert!(matches!(
            decode_did_key("did:key:z0OIl"),
            Err(IdentityError::InvalidBase58)
        ));
        // a multibase prefix other than z must not pass the prefix check
        assert!(matches!(
            decode_did_key("did:key:b6mkeh"),
            Err(IdentityError::InvalidDid(_))
        ));
    }

    #[test]
    fn signing_and_verify_keys_agree() {
        let identity = test_identity();
        let signing = identity.signing_key().unwrap();
        let verify = identity.verify_key().unwrap();

        assert_eq!(signing.verifying_key(), verify);

        let sig = signing.sign(b"test message");
        verify.verify(b"test message", &sig).unwrap();
    }

    #[test]
    fn generate_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity.json");

        let generated = Identity::load_or_generate_at(&path).unwrap();
        assert!(generated.did.starts_with(DID_KEY_PREFIX));

        let loaded = Identity::load_or_generate_at(&path).unwrap();
        assert_eq!(loaded.did, generated.did);
        assert_eq!(loaded.private_key, generated.private_key);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn corrupt_identity_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("identity.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            Identity::load_or_generate_at(&path),
            Err(IdentityError::Parse(_))
        ));
    }
}
