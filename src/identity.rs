//! Node identity resolution
//!
//! Canonical database keys are used as-is. Entities known only by name get a
//! derived identity: the name cleaned to `[A-Za-z0-9_]`, truncated, plus a
//! base-36 suffix hashed from the original name. Hashing the raw name keeps
//! `"Acme Corp."` and `"Acme Corp"` apart even though both clean to the same stem.

use std::sync::LazyLock;

use ownership_types::{IdentifierRef, NodeId, NodeKind};
use regex::Regex;

use crate::config::IdentityConfig;

static ASSET_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^G\d{6,}$").unwrap());
static ENTITY_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^E\d{6,}$").unwrap());
static COMPOSITE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(E\d{6,})_(G\d{6,})$").unwrap());

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Stem used when a name has no characters at all
const EMPTY_NAME_STEM: &str = "entity";

#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    config: IdentityConfig,
}

impl IdentityResolver {
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// A supplied canonical key wins; otherwise derive from the name
    pub fn resolve(&self, name: &str, canonical: Option<&str>) -> NodeId {
        match canonical.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => key.to_string(),
            None => self.derive(name),
        }
    }

    /// Deterministic identity for a display name
    pub fn derive(&self, name: &str) -> NodeId {
        let mut stem: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(self.config.max_name_len)
            .collect();
        if stem.is_empty() {
            stem.push_str(EMPTY_NAME_STEM);
        }
        format!("{}_{}", stem, self.suffix(name))
    }

    /// Fixed-width base-36 suffix of the raw name's hash
    pub fn suffix(&self, name: &str) -> String {
        let width = self.config.suffix_len.clamp(1, crate::config::MAX_SUFFIX_LEN);
        let modulus = 36u64.pow(width as u32);
        to_base36(fnv1a_64(name.as_bytes()) % modulus, width)
    }

    /// Classify an arbitrary identifier string
    pub fn classify(&self, raw: &str) -> IdentifierRef {
        let value = raw.trim();
        if ASSET_KEY_RE.is_match(value) {
            return IdentifierRef::Asset {
                id: value.to_string(),
            };
        }
        if ENTITY_KEY_RE.is_match(value) {
            return IdentifierRef::Entity {
                id: value.to_string(),
            };
        }
        if let Some(caps) = COMPOSITE_KEY_RE.captures(value) {
            return IdentifierRef::Composite {
                entity_id: caps[1].to_string(),
                asset_id: caps[2].to_string(),
            };
        }
        if self.is_derived(value) {
            return IdentifierRef::Derived {
                id: value.to_string(),
            };
        }
        IdentifierRef::Unrecognized {
            raw: raw.to_string(),
        }
    }

    /// Assets are recognised by their canonical key; everything else is an entity
    pub fn kind_of(&self, id: &str) -> NodeKind {
        if ASSET_KEY_RE.is_match(id.trim()) {
            NodeKind::Asset
        } else {
            NodeKind::Entity
        }
    }

    fn is_derived(&self, value: &str) -> bool {
        let Some((stem, suffix)) = value.rsplit_once('_') else {
            return false;
        };
        !stem.is_empty()
            && stem.len() <= self.config.max_name_len
            && stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && suffix.len() == self.config.suffix_len
            && suffix
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
    }
}

/// 64-bit FNV-1a
fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

fn to_base36(mut value: u64, width: usize) -> String {
    let mut digits = vec![b'0'; width];
    for slot in digits.iter_mut().rev() {
        *slot = BASE36_DIGITS[(value % 36) as usize];
        value /= 36;
    }
    // Only ASCII digits and lowercase letters were written
    digits.into_iter().map(char::from).collect()
}
