//! Cache Key Module
//!
//! Defines the closed set of key types a cache can be built over, and the
//! byte encoding each one contributes to ring hashing.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

mod sealed {
    pub trait Sealed {}

    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for super::F64Key {}
    impl Sealed for String {}
}

// == Cache Key ==
/// A key type supported by the cache.
///
/// Implemented for `i32`, `i64`, [`F64Key`] and `String` only; the trait is
/// sealed so unsupported key types are rejected at compile time.
pub trait CacheKey:
    sealed::Sealed + Eq + Hash + Ord + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Appends the ring-hashing byte encoding of the key to `buf`.
    fn encode(&self, buf: &mut Vec<u8>);

    /// Returns the 32-bit ring position of the key.
    fn checksum(&self) -> u32 {
        let mut buf = Vec::with_capacity(16);
        self.encode(&mut buf);
        crc32fast::hash(&buf)
    }
}

impl CacheKey for i32 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl CacheKey for i64 {
    fn encode(&self, buf: &mut Vec<u8>) {
        put_varint(buf, *self);
    }
}

impl CacheKey for F64Key {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0.to_bits().to_le_bytes());
    }
}

impl CacheKey for String {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }
}

/// Zigzag + LEB128 encoding of a signed integer.
fn put_varint(buf: &mut Vec<u8>, value: i64) {
    let mut zz = ((value << 1) ^ (value >> 63)) as u64;
    while zz >= 0x80 {
        buf.push((zz as u8) | 0x80);
        zz >>= 7;
    }
    buf.push(zz as u8);
}

// == Float Key ==
/// A floating point key with bitwise equality and IEEE-754 total ordering.
///
/// `-0.0` and `0.0` are distinct keys, and a NaN is equal to itself when the
/// bit patterns match.
#[derive(Clone, Copy)]
pub struct F64Key(pub f64);

impl F64Key {
    /// Returns the wrapped value.
    pub fn get(self) -> f64 {
        self.0
    }
}

impl From<f64> for F64Key {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl PartialEq for F64Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for F64Key {}

impl Hash for F64Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for F64Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for F64Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Debug for F64Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for F64Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
