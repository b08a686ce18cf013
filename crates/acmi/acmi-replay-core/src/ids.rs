//! Identifiers for recorded objects and their in-memory incarnations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Object identifier as written in ACMI records (hexadecimal, up to 64 bits).
/// Displayed as uppercase hex without leading zeros, the way recorders emit it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// The global object carrying recording-level properties.
    pub const GLOBAL: ObjectId = ObjectId(0);

    /// Parse a hex token. Rejects empty tokens, non-hex digits and values wider than 64 bits.
    pub fn parse_hex(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() || token.len() > 16 {
            return None;
        }
        if !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(token, 16).ok().map(ObjectId)
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// Dense index of one entity incarnation inside a recording.
/// An ObjectId reused after removal maps to a second EntityKey.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntityKey(pub u32);

impl EntityKey {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Monotonic allocator for EntityKey.
#[derive(Default, Debug)]
pub struct KeyAllocator {
    next: u32,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc(&mut self) -> EntityKey {
        let key = EntityKey(self.next);
        self.next = self.next.wrapping_add(1);
        key
    }

    #[inline]
    pub fn allocated(&self) -> usize {
        self.next as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_tokens() {
        assert_eq!(ObjectId::parse_hex("7A"), Some(ObjectId(0x7a)));
        assert_eq!(ObjectId::parse_hex("a0b1"), Some(ObjectId(0xa0b1)));
        assert_eq!(ObjectId::parse_hex(" 102 "), Some(ObjectId(0x102)));
        assert_eq!(ObjectId::parse_hex("0"), Some(ObjectId::GLOBAL));
        assert_eq!(ObjectId::parse_hex(""), None);
        assert_eq!(ObjectId::parse_hex("7G"), None);
        assert_eq!(ObjectId::parse_hex("-7A"), None);
        assert_eq!(ObjectId::parse_hex("1FFFFFFFFFFFFFFFF"), None);
    }

    #[test]
    fn display_is_uppercase_hex() {
        assert_eq!(ObjectId(0x7a).to_string(), "7A");
        assert_eq!(ObjectId(0x10f).to_string(), "10F");
    }

    #[test]
    fn alloc_monotonic() {
        let mut alloc = KeyAllocator::new();
        assert_eq!(alloc.alloc(), EntityKey(0));
        assert_eq!(alloc.alloc(), EntityKey(1));
        assert_eq!(alloc.allocated(), 2);
    }
}
