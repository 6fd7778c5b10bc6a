use thiserror::Error;

use super::status::ExtendedError;

/// Why a piece of a response failed to validate, or was judged insecure.
///
/// These never surface as `Err` from the resolver; they are carried inside
/// a [`super::status::Justification`] next to the final status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsSecError {
    #[error("missing signature")]
    MissingSignature,
    #[error("signature not yet valid (inception {inception})")]
    SignatureNotYetValid { inception: String },
    #[error("signature expired (expiration {expiration})")]
    SignatureExpired { expiration: String },
    #[error("no matching key for signature (tag {key_tag}, algorithm {algorithm})")]
    NoMatchingKey { key_tag: u16, algorithm: u8 },
    #[error("signer {signer} is not the zone {zone}")]
    SignerMismatch { signer: String, zone: String },
    #[error("signature label count {labels} exceeds owner name")]
    LabelCount { labels: u8 },
    #[error("signature verification failed (tag {key_tag})")]
    SignatureFailed { key_tag: u16 },
    #[error("too many signatures ({count} > {limit})")]
    TooManySignatures { count: usize, limit: usize },
    #[error("unsupported algorithm {0}")]
    UnsupportedAlgorithm(u8),
    #[error("unsupported digest {0}")]
    UnsupportedDigest(u8),

    #[error("no trust anchor covers {0}")]
    NoTrustAnchor(String),
    #[error("no DNSKEY RRset for {0}")]
    DnskeyNoRrset(String),
    #[error("no DNSKEY for {zone} (rcode {rcode})")]
    DnskeyNoKey { zone: String, rcode: &'static str },
    #[error("no DNSKEY of {0} matches a DS record")]
    DnskeyNoDsMatch(String),
    #[error("DNSKEY RRset of {0} not signed by a trust anchor key")]
    DnskeyAnchorMismatch(String),
    #[error("no DS record of {0} uses a supported algorithm")]
    DsUnsupportedAlgorithm(String),
    #[error("no DS record of {0} uses a usable digest")]
    DsUnsupportedDigest(String),
    #[error("NSEC proves no DS for {0}")]
    InsecureDelegationNsec(String),
    #[error("NSEC3 proves no DS for {0}")]
    InsecureDelegationNsec3(String),
    #[error("DS for {0} falls into an NSEC3 opt-out span")]
    InsecureDelegationOptOut(String),
    #[error("no proof for missing DS of {0}")]
    DsNoProof(String),
    #[error("DS denial for {0} contradicts itself")]
    DsBogusProof(String),
    #[error("unexpected DS response for {zone} (rcode {rcode})")]
    DsUnexpected { zone: String, rcode: &'static str },
    #[error("sub-query for {query} failed: {detail}")]
    SubqueryFailed { query: String, detail: String },

    #[error("NSEC3 iterations {iterations} above limit {limit}, proof ignored")]
    Nsec3Ignored { iterations: u16, limit: u16 },
    #[error("no signed NSEC or NSEC3 records")]
    NsecMissing,
    #[error("NODATA proof failed for {0}")]
    NodataProofFailed(String),
    #[error("NXDOMAIN proof failed for {0}")]
    NxdomainProofFailed(String),
    #[error("NSEC3 opt-out span covers {0}")]
    Nsec3OptOut(String),
    #[error("wildcard too broad for {0}")]
    WildcardTooBroad(String),
    #[error("no proof that {0} was eligible for wildcard expansion")]
    WildcardUnproven(String),
    #[error("alias chain loops at {0}")]
    CnameLoop(String),
    #[error("alias chain broken at {0}")]
    ChainBroken(String),
    #[error("referral proof failed for {0}")]
    ReferralProofFailed(String),
    #[error("DS and SOA both present at {0}")]
    ReferralContradiction(String),
    #[error("response shape not recognized")]
    UnknownResponse,
    #[error("response carries rcode {0}")]
    ErrorRcode(&'static str),
}

impl DnsSecError {
    /// Short, stable, machine-parseable reason key
    pub fn key(&self) -> &'static str {
        match self {
            Self::MissingSignature => "validate.bogus.missingsig",
            Self::SignatureNotYetValid { .. } => "validate.bogus.sig_not_yet_valid",
            Self::SignatureExpired { .. } => "validate.bogus.sig_expired",
            Self::NoMatchingKey { .. } => "validate.bogus.no_key_match",
            Self::SignerMismatch { .. } => "validate.bogus.signer_mismatch",
            Self::LabelCount { .. } => "validate.bogus.label_count",
            Self::SignatureFailed { .. } => "validate.bogus.sig_failed",
            Self::TooManySignatures { .. } => "validate.bogus.too_many_sigs",
            Self::UnsupportedAlgorithm(_) => "validate.insecure.unsupported_alg",
            Self::UnsupportedDigest(_) => "validate.insecure.unsupported_digest",
            Self::NoTrustAnchor(_) => "insecure.no_anchor",
            Self::DnskeyNoRrset(_) => "dnskey.no_rrset",
            Self::DnskeyNoKey { .. } => "dnskey.no_key",
            Self::DnskeyNoDsMatch(_) => "dnskey.no_ds_match",
            Self::DnskeyAnchorMismatch(_) => "dnskey.anchor_not_matched",
            Self::DsUnsupportedAlgorithm(_) => "insecure.ds.unsupported_alg",
            Self::DsUnsupportedDigest(_) => "insecure.ds.unsupported_digest",
            Self::InsecureDelegationNsec(_) => "insecure.ds.nsec",
            Self::InsecureDelegationNsec3(_) => "insecure.ds.nsec3",
            Self::InsecureDelegationOptOut(_) => "insecure.ds.nsec3_optout",
            Self::DsNoProof(_) => "failed.ds.no_proof",
            Self::DsBogusProof(_) => "failed.ds.nsec_hasdata",
            Self::DsUnexpected { .. } => "failed.ds.unknown",
            Self::SubqueryFailed { .. } => "failed.subquery",
            Self::Nsec3Ignored { .. } => "insecure.nsec3_ignored",
            Self::NsecMissing => "failed.nsec_missing",
            Self::NodataProofFailed(_) => "failed.nodata",
            Self::NxdomainProofFailed(_) => "failed.nxdomain",
            Self::Nsec3OptOut(_) => "insecure.nsec3_optout",
            Self::WildcardTooBroad(_) => "failed.positive.wildcard_too_broad",
            Self::WildcardUnproven(_) => "failed.positive.wildcard_no_proof",
            Self::CnameLoop(_) => "failed.cname.loop",
            Self::ChainBroken(_) => "failed.cname.broken",
            Self::ReferralProofFailed(_) => "failed.referral",
            Self::ReferralContradiction(_) => "failed.referral.ds_with_soa",
            Self::UnknownResponse => "validate.response.unknown",
            Self::ErrorRcode(_) => "validate.response.error_rcode",
        }
    }

    /// RFC 8914 info code reported alongside this reason
    pub fn ede(&self) -> ExtendedError {
        match self {
            Self::MissingSignature => ExtendedError::RrsigsMissing,
            Self::SignatureNotYetValid { .. } => ExtendedError::SignatureNotYetValid,
            Self::SignatureExpired { .. } => ExtendedError::SignatureExpired,
            Self::NoMatchingKey { .. } | Self::DnskeyNoRrset(_) | Self::DnskeyNoKey { .. } => {
                ExtendedError::DnskeyMissing
            }
            Self::UnsupportedAlgorithm(_) | Self::DsUnsupportedAlgorithm(_) => {
                ExtendedError::UnsupportedDnskeyAlgorithm
            }
            Self::UnsupportedDigest(_) | Self::DsUnsupportedDigest(_) => {
                ExtendedError::UnsupportedDsDigestType
            }
            Self::Nsec3Ignored { .. } => ExtendedError::UnsupportedNsec3Iterations,
            Self::NsecMissing | Self::DsNoProof(_) | Self::WildcardUnproven(_) => {
                ExtendedError::NsecMissing
            }
            Self::SubqueryFailed { .. } => ExtendedError::NoReachableAuthority,
            Self::NoTrustAnchor(_)
            | Self::InsecureDelegationNsec(_)
            | Self::InsecureDelegationNsec3(_)
            | Self::InsecureDelegationOptOut(_)
            | Self::Nsec3OptOut(_)
            | Self::ErrorRcode(_) => ExtendedError::Other,
            _ => ExtendedError::DnssecBogus,
        }
    }

    /// Reasons that indicate an unsupported algorithm or digest rather than a forgery
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedAlgorithm(_)
                | Self::UnsupportedDigest(_)
                | Self::DsUnsupportedAlgorithm(_)
                | Self::DsUnsupportedDigest(_)
        )
    }
}
