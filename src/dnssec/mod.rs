//! DNSSEC validation: signatures, chains of trust and proofs of
//! non-existence (RFC 4033-4035, RFC 5155, RFC 6840).

pub mod algorithm;
pub mod digest;
pub mod errors;
pub mod key_entry;
pub mod key_tag;
pub mod message;
pub mod nsec;
pub mod nsec3;
pub mod rrset;
pub mod status;
pub mod trust_anchor;
pub mod val_utils;
pub mod validator;
pub mod verifier;

pub use algorithm::DnsSecAlgorithm;
pub use digest::DigestType;
pub use errors::DnsSecError;
pub use key_entry::KeyEntry;
pub use key_tag::calculate_key_tag;
pub use message::{ResponseClassification, SMessage, Section};
pub use nsec3::Nsec3Proof;
pub use rrset::RRset;
pub use status::{ExtendedError, Justification, SecurityStatus, Verdict};
pub use trust_anchor::{TrustAnchor, TrustAnchorSource, TrustAnchorStore};
pub use validator::{ValidatedResponse, ValidatingResolver};
pub use verifier::SignatureVerifier;
