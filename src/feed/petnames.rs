//! Deterministic petnames: memorable adjective-noun labels for DIDs.

use sha2::{Digest, Sha256};

const ADJECTIVES: [&str; 64] = [
    "amber", "azure", "bold", "bright", "calm", "clear", "cool", "coral", "crimson", "dark",
    "deep", "dry", "dusk", "faint", "fast", "firm", "gold", "green", "grey", "haze", "iron",
    "keen", "kind", "late", "light", "live", "long", "loud", "low", "mild", "mint", "mist",
    "moss", "near", "new", "next", "north", "odd", "old", "open", "pale", "pine", "plain",
    "proud", "pure", "quick", "quiet", "rare", "raw", "red", "rich", "sage", "salt", "sand",
    "sharp", "shy", "silk", "slim", "slow", "soft", "south", "steel", "still", "stone",
];

const NOUNS: [&str; 64] = [
    "ash", "bay", "birch", "bloom", "brook", "cave", "cedar", "cliff", "cloud", "coal", "cove",
    "crane", "creek", "crow", "dawn", "deer", "dove", "dune", "dusk", "eagle", "elm", "ember",
    "fern", "finch", "fire", "flint", "fox", "frost", "gale", "glen", "grove", "hawk", "haze",
    "heath", "heron", "hill", "ivy", "jade", "jay", "lake", "lark", "leaf", "marsh", "mesa",
    "moon", "oak", "owl", "peak", "pine", "pond", "rain", "reed", "ridge", "rock", "rose",
    "sage", "shade", "shore", "sky", "snow", "star", "storm", "stone", "vale",
];

/// Derive an adjective-noun petname from a DID. Pure: the same DID always
/// maps to the same name.
pub fn petname_from_did(did: &str) -> String {
    let hash = Sha256::digest(did.as_bytes());
    let adjective = ADJECTIVES[(hash[0] % 64) as usize];
    let noun = NOUNS[(hash[1] % 64) as usize];
    format!("{adjective}-{noun}")
}
