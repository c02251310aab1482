use crate::error::{Error, Result};
use crypto::digest::Digest;
use crypto::sha1::Sha1;
use rustc_serialize::hex::{FromHex, ToHex};
use std::fmt;

/// Length of a hash's hex representation.
pub const HEX_LEN: usize = 40;

/// Type Hash represents the key under which content is stored: the SHA-1 digest of the exact
/// bytes of an object.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub struct Hash(Vec<u8>);

impl Hash {
    /// Create a new hash, given a hex representation.
    pub fn from_hex(hex: &str) -> Result<Hash> {
        if hex.len() != HEX_LEN {
            return Err(Error::InvalidHash(hex.to_string()));
        }
        match hex.from_hex() {
            Ok(bytes) => Ok(Hash(bytes)),
            Err(_) => Err(Error::InvalidHash(hex.to_string())),
        }
    }

    /// Create a new hash for the given content
    pub fn for_bytes(bytes: &[u8]) -> Hash {
        let mut sha = Sha1::new();
        sha.input(bytes);
        let mut hash = Hash(vec![0; sha.output_bytes()]);
        sha.result(&mut hash.0);
        hash
    }

    /// Get the hex representation of this hash.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Is `s` shaped like a hex hash?  Used when parsing text formats that embed hashes.
    pub fn is_hex(s: &str) -> bool {
        s.len() == HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
