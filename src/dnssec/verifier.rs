use std::sync::Arc;

use dsa::{BigUint, signature::DigestVerifier};
use ring::signature::{self, RsaPublicKeyComponents, UnparsedPublicKey};
use sha1::{Digest, Sha1};
use tracing::{debug, trace};

use super::algorithm::{
    Backend, DnsSecAlgorithm, split_dsa_key, split_dsa_signature, split_rsa_key,
};
use super::errors::DnsSecError;
use super::key_tag::calculate_key_tag;
use super::rrset::RRset;
use super::status::Verdict;
use crate::config::ValidatorConfig;
use crate::dns::{
    name::Name,
    rdata::{DNSKEY_PROTOCOL, DnsKeyData, RrsigData},
};

/// Current time as an RRSIG timestamp (seconds since the epoch, mod 2^32)
pub fn current_time() -> u32 {
    chrono::Utc::now().timestamp() as u32
}

/// `a < b` in RFC 1982 serial number arithmetic
pub(crate) fn serial_lt(a: u32, b: u32) -> bool {
    a != b && (b.wrapping_sub(a) as i32) > 0
}

/// RRSIG timestamp as `YYYYMMDDHHMMSS`
pub fn format_timestamp(timestamp: u32) -> String {
    chrono::DateTime::from_timestamp(i64::from(timestamp), 0)
        .map(|t| t.format("%Y%m%d%H%M%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// The data an RRSIG signs (RFC 4034 §3.1.8.1): the RRSIG RDATA without its
/// signature, then every record in canonical form and order, owner rebuilt
/// as a wildcard when the signature's label count says the set was expanded.
pub fn signature_input(sig: &RrsigData, rrset: &RRset) -> Vec<u8> {
    let mut data = Vec::with_capacity(256);
    sig.write_signed_prefix(&mut data);

    let owner = rrset.name();
    let labels = sig.labels as usize;
    let owner_wire = if labels < owner.label_count() {
        owner
            .trim_to(labels)
            .wildcard()
            .unwrap_or_else(|_| owner.clone())
            .to_canonical_wire()
    } else {
        owner.to_canonical_wire()
    };

    let mut rdatas: Vec<Vec<u8>> = rrset
        .records()
        .iter()
        .map(|r| r.rdata.to_canonical_wire())
        .collect();
    rdatas.sort();
    rdatas.dedup();

    let rtype = u16::from(rrset.rtype()).to_be_bytes();
    let rclass = u16::from(rrset.rclass()).to_be_bytes();
    for rdata in rdatas {
        data.extend_from_slice(&owner_wire);
        data.extend_from_slice(&rtype);
        data.extend_from_slice(&rclass);
        data.extend_from_slice(&sig.original_ttl.to_be_bytes());
        data.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        data.extend_from_slice(&rdata);
    }
    data
}

struct Candidate<'a> {
    owner: &'a Name,
    key: &'a DnsKeyData,
    tag: u16,
}

/// Checks RRSIGs over an RRset against candidate DNSKEYs.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    config: Arc<ValidatorConfig>,
}

impl SignatureVerifier {
    pub fn new(config: Arc<ValidatorConfig>) -> Self {
        Self { config }
    }

    /// Secure once any signature verifies under any key of the DNSKEY set.
    pub fn verify(&self, rrset: &RRset, keys: &RRset, now: u32) -> Verdict {
        let candidates: Vec<Candidate<'_>> = keys
            .records()
            .iter()
            .filter_map(|r| r.as_dnskey())
            .map(|key| Candidate {
                owner: keys.name(),
                key,
                tag: calculate_key_tag(key),
            })
            .collect();
        self.verify_candidates(rrset, &candidates, now)
    }

    /// Like [`Self::verify`] but only `key`, owned by `owner`, may sign.
    pub fn verify_with_key(
        &self,
        rrset: &RRset,
        owner: &Name,
        key: &DnsKeyData,
        now: u32,
    ) -> Verdict {
        let candidate = Candidate {
            owner,
            key,
            tag: calculate_key_tag(key),
        };
        self.verify_candidates(rrset, &[candidate], now)
    }

    fn verify_candidates(&self, rrset: &RRset, candidates: &[Candidate<'_>], now: u32) -> Verdict {
        if !rrset.is_signed() {
            debug!("{} carries no signatures", rrset);
            return Verdict::bogus(DnsSecError::MissingSignature).wrap(rrset.to_string());
        }

        let count = rrset.sigs().len();
        let limit = self.config.max_validate_rrsigs;
        if limit > 0 && count > limit {
            return Verdict::bogus(DnsSecError::TooManySignatures { count, limit })
                .wrap(rrset.to_string());
        }

        let mut worst: Option<DnsSecError> = None;
        for sig in rrset.rrsigs() {
            match self.check_signature(rrset, sig, candidates, now) {
                Ok(()) => {
                    debug!(
                        "Verified {} with key tag {} algorithm {}",
                        rrset, sig.key_tag, sig.algorithm
                    );
                    return Verdict::secure();
                }
                Err(reason) => {
                    trace!("Signature tag {} over {} rejected: {}", sig.key_tag, rrset, reason);
                    if worst.as_ref().is_none_or(|w| rank(&reason) > rank(w)) {
                        worst = Some(reason);
                    }
                }
            }
        }

        let reason = worst.unwrap_or(DnsSecError::MissingSignature);
        Verdict::bogus(reason).wrap(rrset.to_string())
    }

    fn check_signature(
        &self,
        rrset: &RRset,
        sig: &RrsigData,
        candidates: &[Candidate<'_>],
        now: u32,
    ) -> Result<(), DnsSecError> {
        let owner = rrset.name();
        let owner_labels = owner.label_count() - usize::from(owner.is_wildcard());
        if usize::from(sig.labels) > owner_labels {
            return Err(DnsSecError::LabelCount { labels: sig.labels });
        }
        if !owner.is_subdomain_of(&sig.signer_name) {
            return Err(DnsSecError::SignerMismatch {
                signer: sig.signer_name.to_string(),
                zone: owner.to_string(),
            });
        }

        if serial_lt(now, sig.inception) {
            return Err(DnsSecError::SignatureNotYetValid {
                inception: format_timestamp(sig.inception),
            });
        }
        if serial_lt(sig.expiration, now) {
            return Err(DnsSecError::SignatureExpired {
                expiration: format_timestamp(sig.expiration),
            });
        }

        let algorithm = match DnsSecAlgorithm::from_u8(sig.algorithm) {
            Some(algorithm) if self.config.algorithm_enabled(sig.algorithm) => algorithm,
            _ => return Err(DnsSecError::UnsupportedAlgorithm(sig.algorithm)),
        };

        let mut matched = candidates.iter().filter(|c| {
            c.tag == sig.key_tag
                && c.key.algorithm == sig.algorithm
                && c.key.protocol == DNSKEY_PROTOCOL
                && c.key.is_zone_key()
                && !c.key.is_revoked()
                && *c.owner == sig.signer_name
        });

        let Some(first) = matched.next() else {
            if let Some(other) = candidates.first().filter(|c| *c.owner != sig.signer_name) {
                return Err(DnsSecError::SignerMismatch {
                    signer: sig.signer_name.to_string(),
                    zone: other.owner.to_string(),
                });
            }
            return Err(DnsSecError::NoMatchingKey {
                key_tag: sig.key_tag,
                algorithm: sig.algorithm,
            });
        };

        let data = signature_input(sig, rrset);
        // key tags collide, so every matching key gets a try
        for candidate in std::iter::once(first).chain(matched) {
            if verify_raw(algorithm, candidate.key, &data, &sig.signature) {
                return Ok(());
            }
        }
        Err(DnsSecError::SignatureFailed {
            key_tag: sig.key_tag,
        })
    }
}

/// How telling a per-signature failure is when several signatures fail
fn rank(reason: &DnsSecError) -> u8 {
    match reason {
        DnsSecError::SignatureFailed { .. } => 5,
        DnsSecError::SignatureExpired { .. } | DnsSecError::SignatureNotYetValid { .. } => 4,
        DnsSecError::NoMatchingKey { .. } | DnsSecError::SignerMismatch { .. } => 3,
        DnsSecError::LabelCount { .. } => 2,
        DnsSecError::UnsupportedAlgorithm(_) => 1,
        _ => 0,
    }
}

/// One cryptographic check
fn verify_raw(algorithm: DnsSecAlgorithm, key: &DnsKeyData, data: &[u8], sig: &[u8]) -> bool {
    match algorithm.backend() {
        Some(Backend::Rsa(params)) => {
            let Some((e, n)) = split_rsa_key(&key.public_key) else {
                return false;
            };
            let start = n.iter().position(|&b| b != 0).unwrap_or(n.len());
            RsaPublicKeyComponents { n: &n[start..], e }
                .verify(params, data, sig)
                .is_ok()
        }
        Some(Backend::Ecdsa(params)) => {
            // DNSKEY carries the bare point; ring wants the uncompressed SEC1 form
            let mut point = Vec::with_capacity(key.public_key.len() + 1);
            point.push(0x04);
            point.extend_from_slice(&key.public_key);
            UnparsedPublicKey::new(params, &point).verify(data, sig).is_ok()
        }
        Some(Backend::Ed25519) => UnparsedPublicKey::new(&signature::ED25519, &key.public_key)
            .verify(data, sig)
            .is_ok(),
        Some(Backend::Dsa) => verify_dsa(&key.public_key, data, sig).is_some(),
        Some(Backend::Ed448) => verify_ed448(&key.public_key, data, sig).is_some(),
        None => false,
    }
}

/// DSA over SHA-1 (RFC 2536); `None` on a malformed key or a bad signature
fn verify_dsa(public_key: &[u8], data: &[u8], sig: &[u8]) -> Option<()> {
    let parts = split_dsa_key(public_key)?;
    let (r, s) = split_dsa_signature(sig)?;
    let components = dsa::Components::from_components(
        BigUint::from_bytes_be(parts.p),
        BigUint::from_bytes_be(parts.q),
        BigUint::from_bytes_be(parts.g),
    )
    .ok()?;
    let key = dsa::VerifyingKey::from_components(components, BigUint::from_bytes_be(parts.y)).ok()?;
    let signature =
        dsa::Signature::from_components(BigUint::from_bytes_be(r), BigUint::from_bytes_be(s))
            .ok()?;
    key.verify_digest(Sha1::new_with_prefix(data), &signature).ok()
}

/// Pure Ed448 (RFC 8080): a 57-octet key and a 114-octet signature
fn verify_ed448(public_key: &[u8], data: &[u8], sig: &[u8]) -> Option<()> {
    let bytes = <&[u8; 57]>::try_from(public_key).ok()?;
    let key = ed448_goldilocks_plus::VerifyingKey::from_bytes(bytes).ok()?;
    let signature = ed448_goldilocks_plus::Signature::try_from(sig).ok()?;
    dsa::signature::Verifier::verify(&key, data, &signature).ok()
}
