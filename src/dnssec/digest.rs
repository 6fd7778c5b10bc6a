use std::fmt;
use std::str::FromStr;

use ring::digest;

use crate::dns::{name::Name, rdata::DnsKeyData};
use crate::error::ConfigError;

/// DS digest type algorithms (RFC 4034, 4509, 5933, 6605)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DigestType {
    /// SHA-1 (RFC 3658)
    Sha1 = 1,
    /// SHA-256 (RFC 4509)
    Sha256 = 2,
    /// GOST R 34.11-94 (RFC 5933)
    Gost94 = 3,
    /// SHA-384 (RFC 6605)
    Sha384 = 4,
}

impl DigestType {
    /// Create from digest type number
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sha1),
            2 => Some(Self::Sha256),
            3 => Some(Self::Gost94),
            4 => Some(Self::Sha384),
            _ => None,
        }
    }

    /// Convert to digest type number
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// GOST is recognized but has no implementation here
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Sha1 | Self::Sha256 | Self::Sha384)
    }

    /// Get the expected digest length in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 | Self::Gost94 => 32,
            Self::Sha384 => 48,
        }
    }

    /// Calculate digest of data using this algorithm
    pub fn digest(&self, data: &[u8]) -> Option<Vec<u8>> {
        let algorithm = match self {
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => &digest::SHA256,
            Self::Sha384 => &digest::SHA384,
            Self::Gost94 => return None,
        };
        Some(digest::digest(algorithm, data).as_ref().to_vec())
    }

    /// DS digest of a DNSKEY: hash(canonical owner | DNSKEY RDATA), RFC 4034 §5.1.4
    pub fn ds_digest(&self, owner: &Name, key: &DnsKeyData) -> Option<Vec<u8>> {
        let mut data = owner.to_canonical_wire();
        data.extend_from_slice(&key.flags.to_be_bytes());
        data.push(key.protocol);
        data.push(key.algorithm);
        data.extend_from_slice(&key.public_key);
        self.digest(&data)
    }
}

impl FromStr for DigestType {
    type Err = ConfigError;

    /// Accepts a decimal digest id or a mnemonic, with or without the dash.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if let Ok(number) = token.parse::<u8>() {
            return Self::from_u8(number).ok_or_else(|| ConfigError::UnknownDigest(s.to_string()));
        }
        match token.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "GOST" | "GOST94" => Ok(Self::Gost94),
            "SHA384" => Ok(Self::Sha384),
            _ => Err(ConfigError::UnknownDigest(s.to_string())),
        }
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA-1"),
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Gost94 => write!(f, "GOST R 34.11-94"),
            Self::Sha384 => write!(f, "SHA-384"),
        }
    }
}
