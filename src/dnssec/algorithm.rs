use std::fmt;
use std::str::FromStr;

use ring::signature::{self, EcdsaVerificationAlgorithm, RsaParameters};

use crate::error::ConfigError;

/// DNSSEC Algorithm numbers (RFC 4034, 5155, 5702, 6605, 8080, 8624)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DnsSecAlgorithm {
    /// RSA/MD5 (deprecated)
    RsaMd5 = 1,
    /// DSA/SHA1 (RFC 2536)
    DSA = 3,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// DSA-NSEC3-SHA1 (RFC 5155)
    DsaNsec3Sha1 = 6,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// GOST R 34.10-2001 (RFC 5933)
    EccGost = 12,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    /// Ed25519 (RFC 8080)
    Ed25519 = 15,
    /// Ed448 (RFC 8080)
    Ed448 = 16,
}

/// Which library verifies a given algorithm: ring where it can, RustCrypto
/// for the DSA and Ed448 keys ring does not handle
pub(crate) enum Backend {
    Rsa(&'static RsaParameters),
    Ecdsa(&'static EcdsaVerificationAlgorithm),
    Ed25519,
    Dsa,
    Ed448,
}

impl DnsSecAlgorithm {
    /// Create from algorithm number
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RsaMd5),
            3 => Some(Self::DSA),
            5 => Some(Self::RsaSha1),
            6 => Some(Self::DsaNsec3Sha1),
            7 => Some(Self::RsaSha1Nsec3Sha1),
            8 => Some(Self::RsaSha256),
            10 => Some(Self::RsaSha512),
            12 => Some(Self::EccGost),
            13 => Some(Self::EcdsaP256Sha256),
            14 => Some(Self::EcdsaP384Sha384),
            15 => Some(Self::Ed25519),
            16 => Some(Self::Ed448),
            _ => None,
        }
    }

    /// Convert to algorithm number
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// True when this build can verify signatures of this algorithm.
    /// RSA/MD5 and GOST are recognized but have no backend.
    pub fn is_supported(&self) -> bool {
        self.backend().is_some()
    }

    /// Check if algorithm is recommended for validation (RFC 8624)
    pub fn is_recommended(&self) -> bool {
        matches!(
            self,
            Self::RsaSha256 | Self::EcdsaP256Sha256 | Self::EcdsaP384Sha384 | Self::Ed25519
        )
    }

    pub(crate) fn backend(&self) -> Option<Backend> {
        match self {
            Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 => Some(Backend::Rsa(
                &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
            )),
            Self::RsaSha256 => Some(Backend::Rsa(
                &signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
            )),
            Self::RsaSha512 => Some(Backend::Rsa(
                &signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY,
            )),
            Self::EcdsaP256Sha256 => Some(Backend::Ecdsa(&signature::ECDSA_P256_SHA256_FIXED)),
            Self::EcdsaP384Sha384 => Some(Backend::Ecdsa(&signature::ECDSA_P384_SHA384_FIXED)),
            Self::Ed25519 => Some(Backend::Ed25519),
            Self::DSA | Self::DsaNsec3Sha1 => Some(Backend::Dsa),
            Self::Ed448 => Some(Backend::Ed448),
            Self::RsaMd5 | Self::EccGost => None,
        }
    }

    /// Key strength in bits, used to pick the NSEC3 iteration ceiling.
    pub fn key_size_bits(&self, public_key: &[u8]) -> Option<u32> {
        match self {
            Self::RsaMd5
            | Self::RsaSha1
            | Self::RsaSha1Nsec3Sha1
            | Self::RsaSha256
            | Self::RsaSha512 => {
                let (_, modulus) = split_rsa_key(public_key)?;
                let modulus = strip_leading_zeros(modulus);
                let first = *modulus.first()?;
                Some(modulus.len() as u32 * 8 - first.leading_zeros())
            }
            // T parameter (RFC 2536 §2)
            Self::DSA | Self::DsaNsec3Sha1 => public_key.first().map(|&t| 512 + 64 * t as u32),
            Self::EccGost | Self::EcdsaP256Sha256 | Self::Ed25519 => Some(256),
            Self::EcdsaP384Sha384 => Some(384),
            Self::Ed448 => Some(456),
        }
    }
}

/// Split an RFC 3110 RSA public key into (exponent, modulus).
pub(crate) fn split_rsa_key(public_key: &[u8]) -> Option<(&[u8], &[u8])> {
    let (&first, rest) = public_key.split_first()?;
    let (exp_len, rest) = if first == 0 {
        if rest.len() < 2 {
            return None;
        }
        (u16::from_be_bytes([rest[0], rest[1]]) as usize, &rest[2..])
    } else {
        (first as usize, rest)
    };
    if exp_len == 0 || rest.len() <= exp_len {
        return None;
    }
    Some(rest.split_at(exp_len))
}

/// DSA public key fields (RFC 2536 §2)
pub(crate) struct DsaKey<'a> {
    pub q: &'a [u8],
    pub p: &'a [u8],
    pub g: &'a [u8],
    pub y: &'a [u8],
}

/// Split a DSA DNSKEY into T, Q, P, G and Y; P, G and Y are 64 + 8T octets
pub(crate) fn split_dsa_key(public_key: &[u8]) -> Option<DsaKey<'_>> {
    let (&t, rest) = public_key.split_first()?;
    if t > 8 {
        return None;
    }
    let len = 64 + 8 * t as usize;
    if rest.len() != 20 + 3 * len {
        return None;
    }
    let (q, rest) = rest.split_at(20);
    let (p, rest) = rest.split_at(len);
    let (g, y) = rest.split_at(len);
    Some(DsaKey { q, p, g, y })
}

/// Split a DSA signature into R and S (RFC 2536 §3), dropping the T octet
pub(crate) fn split_dsa_signature(sig: &[u8]) -> Option<(&[u8], &[u8])> {
    match sig {
        [_, rest @ ..] if rest.len() == 40 => Some(rest.split_at(20)),
        _ => None,
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

impl FromStr for DnsSecAlgorithm {
    type Err = ConfigError;

    /// Accepts a decimal algorithm number or an RFC mnemonic.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if let Ok(number) = token.parse::<u8>() {
            return Self::from_u8(number).ok_or_else(|| ConfigError::UnknownAlgorithm(s.to_string()));
        }
        let algorithm = match token.to_ascii_uppercase().as_str() {
            "RSAMD5" => Self::RsaMd5,
            "DSA" => Self::DSA,
            "RSASHA1" => Self::RsaSha1,
            "DSA-NSEC3-SHA1" => Self::DsaNsec3Sha1,
            "RSASHA1-NSEC3-SHA1" => Self::RsaSha1Nsec3Sha1,
            "RSASHA256" => Self::RsaSha256,
            "RSASHA512" => Self::RsaSha512,
            "ECC-GOST" => Self::EccGost,
            "ECDSAP256SHA256" => Self::EcdsaP256Sha256,
            "ECDSAP384SHA384" => Self::EcdsaP384Sha384,
            "ED25519" => Self::Ed25519,
            "ED448" => Self::Ed448,
            _ => return Err(ConfigError::UnknownAlgorithm(s.to_string())),
        };
        Ok(algorithm)
    }
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RsaMd5 => write!(f, "RSAMD5"),
            Self::DSA => write!(f, "DSA"),
            Self::RsaSha1 => write!(f, "RSASHA1"),
            Self::DsaNsec3Sha1 => write!(f, "DSA-NSEC3-SHA1"),
            Self::RsaSha1Nsec3Sha1 => write!(f, "RSASHA1-NSEC3-SHA1"),
            Self::RsaSha256 => write!(f, "RSASHA256"),
            Self::RsaSha512 => write!(f, "RSASHA512"),
            Self::EccGost => write!(f, "ECC-GOST"),
            Self::EcdsaP256Sha256 => write!(f, "ECDSAP256SHA256"),
            Self::EcdsaP384Sha384 => write!(f, "ECDSAP384SHA384"),
            Self::Ed25519 => write!(f, "ED25519"),
            Self::Ed448 => write!(f, "ED448"),
        }
    }
}
