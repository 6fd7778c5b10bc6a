//! Helpers shared by key priming and response validation.

use tracing::{debug, trace};

use super::digest::DigestType;
use super::errors::DnsSecError;
use super::key_entry::KeyEntry;
use super::message::{ResponseClassification, SMessage};
use super::rrset::RRset;
use super::status::Verdict;
use super::verifier::SignatureVerifier;
use crate::config::ValidatorConfig;
use crate::dns::{
    constants::DNSRcode,
    enums::DNSResourceType,
    name::Name,
    rdata::{DnsKeyData, DsData, NsecData},
};
use crate::dnssec::key_tag::calculate_key_tag;

/// Decide what kind of answer `msg` is for its own question.
pub fn classify(msg: &SMessage) -> ResponseClassification {
    use ResponseClassification as C;

    let rcode = msg.rcode();
    if rcode != DNSRcode::NOERROR && rcode != DNSRcode::NXDOMAIN {
        return C::Error;
    }
    let Some(question) = &msg.question else {
        return C::Unknown;
    };
    let qtype = question.qtype;

    if qtype == DNSResourceType::ANY && rcode == DNSRcode::NOERROR && !msg.answer().is_empty() {
        return C::Any;
    }

    // follow the alias chain through the answer section
    let mut current = question.name.clone();
    let mut aliases = 0usize;
    for _ in 0..=msg.answer().len() {
        let answer = msg.answer();
        if answer
            .iter()
            .any(|rrset| rrset.rtype() == qtype && *rrset.name() == current)
        {
            return if aliases == 0 { C::Positive } else { C::Cname };
        }
        if let Some(target) = answer
            .iter()
            .find(|rrset| rrset.rtype() == DNSResourceType::CNAME && *rrset.name() == current)
            .and_then(|rrset| rrset.records().first())
            .and_then(|r| r.alias_target())
        {
            current = target.clone();
            aliases += 1;
            continue;
        }
        if let Some(dname) = answer.iter().find(|rrset| {
            rrset.rtype() == DNSResourceType::DNAME && current.is_strict_subdomain_of(rrset.name())
        }) {
            let Some(target) = dname.records().first().and_then(|r| r.alias_target()) else {
                return C::Unknown;
            };
            match current.replace_suffix(dname.name(), target) {
                Ok(next) => {
                    current = next;
                    aliases += 1;
                    continue;
                }
                Err(_) => return C::Unknown,
            }
        }
        break;
    }

    if rcode == DNSRcode::NXDOMAIN {
        return if aliases == 0 { C::Nxdomain } else { C::CnameNxdomain };
    }
    if aliases > 0 {
        return C::CnameNodata;
    }
    if !msg.answer().is_empty() {
        return C::Unknown;
    }

    let authority = msg.authority();
    let has_soa = authority.iter().any(|r| r.rtype() == DNSResourceType::SOA);
    let cut = authority
        .iter()
        .find(|r| r.rtype() == DNSResourceType::NS && current.is_subdomain_of(r.name()));
    if let Some(cut) = cut {
        // a DS at the cut keeps it a referral even with an SOA alongside
        let ds_at_cut = authority
            .iter()
            .any(|r| r.rtype() == DNSResourceType::DS && r.name() == cut.name());
        if !has_soa || ds_at_cut {
            return C::Referral;
        }
    }
    let empty_nonterminal = authority
        .iter()
        .filter(|r| r.rtype() == DNSResourceType::NSEC)
        .flat_map(|r| r.records().iter().map(move |rec| (r.name(), rec)))
        .filter_map(|(owner, rec)| rec.as_nsec().map(|nsec| (owner, nsec)))
        .any(|(owner, nsec)| *owner < current && nsec.next_domain.is_strict_subdomain_of(&current));
    if empty_nonterminal {
        C::NodataEmptyNonterminal
    } else {
        C::Nodata
    }
}

/// The longest ancestor-or-self of `qname` shared with any candidate owner.
/// Depends only on the candidates, not their order.
pub fn closest_encloser<'a, I>(candidates: I, qname: &Name) -> Option<Name>
where
    I: IntoIterator<Item = &'a Name>,
{
    candidates
        .into_iter()
        .map(|owner| qname.common_ancestor(owner))
        .max_by_key(Name::label_count)
}

fn ds_records(ds_rrset: &RRset) -> impl Iterator<Item = &DsData> {
    ds_rrset.records().iter().filter_map(|r| r.as_ds())
}

/// Some DS record names an algorithm this validator can use
pub fn at_least_one_supported_algorithm(ds_rrset: &RRset, config: &ValidatorConfig) -> bool {
    ds_records(ds_rrset).any(|ds| config.algorithm_enabled(ds.algorithm))
}

/// The most preferred usable digest among DS records with a usable
/// algorithm, or 0 when there is none.
pub fn favorite_ds_digest_id(ds_rrset: &RRset, config: &ValidatorConfig) -> u8 {
    ds_records(ds_rrset)
        .filter(|ds| config.algorithm_enabled(ds.algorithm))
        .filter_map(|ds| config.digest_rank(ds.digest_type).map(|rank| (rank, ds.digest_type)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, digest)| digest)
        .unwrap_or(0)
}

/// Usable digests present in the set, most preferred first
fn usable_digests(ds_rrset: &RRset, config: &ValidatorConfig) -> Vec<u8> {
    let mut digests: Vec<(usize, u8)> = ds_records(ds_rrset)
        .filter(|ds| config.algorithm_enabled(ds.algorithm))
        .filter_map(|ds| config.digest_rank(ds.digest_type).map(|rank| (rank, ds.digest_type)))
        .collect();
    digests.sort_unstable();
    digests.dedup();
    digests.into_iter().map(|(_, digest)| digest).collect()
}

/// The DNSKEY matches the DS by tag, algorithm and digest
pub fn ds_matches_key(owner: &Name, ds: &DsData, key: &DnsKeyData) -> bool {
    if ds.algorithm != key.algorithm || ds.key_tag != calculate_key_tag(key) {
        return false;
    }
    DigestType::from_u8(ds.digest_type)
        .and_then(|digest| digest.ds_digest(owner, key))
        .is_some_and(|computed| computed == ds.digest)
}

/// Check a fetched DNSKEY RRset against the DS RRset that delegates to it.
///
/// A DNSKEY matching a DS of `digest` must sign the whole DNSKEY set. With
/// downgrade hardening every usable algorithm of those DS records needs such
/// a key; without it one suffices and weaker digests are tried as well.
pub fn verify_new_dnskeys(
    dnskey_rrset: &RRset,
    ds_rrset: &RRset,
    config: &ValidatorConfig,
    verifier: &SignatureVerifier,
    now: u32,
) -> KeyEntry {
    let zone = dnskey_rrset.name().clone();
    let class = dnskey_rrset.rclass();

    if !at_least_one_supported_algorithm(ds_rrset, config) {
        debug!("No DS record of {} uses a supported algorithm", zone);
        return KeyEntry::null(zone.clone(), class, DnsSecError::DsUnsupportedAlgorithm(zone.to_string()));
    }
    let favorite = favorite_ds_digest_id(ds_rrset, config);
    if favorite == 0 {
        debug!("No DS record of {} uses a usable digest", zone);
        return KeyEntry::null(zone.clone(), class, DnsSecError::DsUnsupportedDigest(zone.to_string()));
    }

    let digests = if config.harden_algo_downgrade {
        vec![favorite]
    } else {
        usable_digests(ds_rrset, config)
    };

    let mut failure: Option<Verdict> = None;
    for digest in digests {
        match verify_with_digest(dnskey_rrset, ds_rrset, digest, config, verifier, now) {
            Ok(()) => {
                debug!("DNSKEY RRset of {} verified against DS digest {}", zone, digest);
                return KeyEntry::good(dnskey_rrset.clone());
            }
            Err(verdict) => {
                failure.get_or_insert(verdict);
            }
        }
    }

    let justification = failure
        .and_then(|v| v.justification)
        .unwrap_or_else(|| DnsSecError::DnskeyNoDsMatch(zone.to_string()).into());
    KeyEntry::bad(zone, class, justification)
}

fn verify_with_digest(
    dnskey_rrset: &RRset,
    ds_rrset: &RRset,
    digest: u8,
    config: &ValidatorConfig,
    verifier: &SignatureVerifier,
    now: u32,
) -> Result<(), Verdict> {
    let zone = dnskey_rrset.name();
    let candidates: Vec<&DsData> = ds_records(ds_rrset)
        .filter(|ds| ds.digest_type == digest && config.algorithm_enabled(ds.algorithm))
        .collect();

    let mut algorithms: Vec<u8> = candidates.iter().map(|ds| ds.algorithm).collect();
    algorithms.sort_unstable();
    algorithms.dedup();

    let mut verified_any = false;
    let mut last_failure = None;
    for algorithm in algorithms {
        let mut verified = false;
        for ds in candidates.iter().filter(|ds| ds.algorithm == algorithm) {
            for key in dnskey_rrset.records().iter().filter_map(|r| r.as_dnskey()) {
                if !ds_matches_key(zone, ds, key) {
                    continue;
                }
                trace!("DS tag {} matches a DNSKEY of {}", ds.key_tag, zone);
                let verdict = verifier.verify_with_key(dnskey_rrset, zone, key, now);
                if verdict.is_secure() {
                    verified = true;
                    break;
                }
                last_failure = Some(verdict);
            }
            if verified {
                break;
            }
        }

        if verified {
            verified_any = true;
        } else if config.harden_algo_downgrade {
            debug!("No DNSKEY of {} with algorithm {} signs the key set", zone, algorithm);
            return Err(last_failure
                .unwrap_or_else(|| Verdict::bogus(DnsSecError::DnskeyNoDsMatch(zone.to_string()))));
        }
    }

    if verified_any {
        Ok(())
    } else {
        Err(last_failure
            .map(|v| v.wrap(format!("DNSKEY RRset of {}", zone)))
            .unwrap_or_else(|| Verdict::bogus(DnsSecError::DnskeyNoDsMatch(zone.to_string()))))
    }
}

/// Check a fetched DNSKEY RRset against configured DNSKEY anchors: one
/// anchor key present in the fetched set must sign it.
pub fn verify_dnskeys_with_anchor(
    dnskey_rrset: &RRset,
    anchor: &RRset,
    config: &ValidatorConfig,
    verifier: &SignatureVerifier,
    now: u32,
) -> KeyEntry {
    let zone = dnskey_rrset.name().clone();
    let class = dnskey_rrset.rclass();
    let anchor_keys: Vec<&DnsKeyData> = anchor.records().iter().filter_map(|r| r.as_dnskey()).collect();

    if !anchor_keys.iter().any(|key| config.algorithm_enabled(key.algorithm)) {
        return KeyEntry::null(zone, class, DnsSecError::UnsupportedAlgorithm(
            anchor_keys.first().map(|k| k.algorithm).unwrap_or(0),
        ));
    }

    let mut failure = None;
    for key in anchor_keys {
        let verdict = verifier.verify_with_key(dnskey_rrset, &zone, key, now);
        if verdict.is_secure() {
            debug!("DNSKEY RRset of {} signed by anchor key {}", zone, calculate_key_tag(key));
            return KeyEntry::good(dnskey_rrset.clone());
        }
        failure.get_or_insert(verdict);
    }

    let justification = failure
        .and_then(|v| v.justification)
        .map(|j| j.wrap(DnsSecError::DnskeyAnchorMismatch(zone.to_string()).to_string()))
        .unwrap_or_else(|| DnsSecError::DnskeyAnchorMismatch(zone.to_string()).into());
    KeyEntry::bad(zone, class, justification)
}

/// What the NSEC at `owner` says about a DS at `owner`.
///
/// Secure proves a delegation without DS. Indeterminate means `owner` is no
/// zone cut. A DS bit, or an SOA bit anywhere but the root, is bogus since a
/// child apex NSEC cannot speak for its parent.
pub fn nsec_proves_no_ds(nsec: &NsecData, owner: &Name) -> Verdict {
    let types = &nsec.types;
    if types.contains(DNSResourceType::DS) {
        return Verdict::bogus(DnsSecError::DsBogusProof(owner.to_string())).wrap("DS bit set");
    }
    if types.contains(DNSResourceType::SOA) && !owner.is_root() {
        return Verdict::bogus(DnsSecError::DsBogusProof(owner.to_string())).wrap("NSEC from child apex");
    }
    if !types.contains(DNSResourceType::NS) {
        return Verdict::indeterminate(DnsSecError::NodataProofFailed(owner.to_string()))
            .wrap("not a delegation");
    }
    Verdict::secure()
}

/// True only when denial material is present and every NSEC or NSEC3 RRset
/// of the authority section is signed
pub fn has_signed_nsecs(msg: &SMessage) -> bool {
    let mut any = false;
    for rrset in msg.authority() {
        if matches!(rrset.rtype(), DNSResourceType::NSEC | DNSResourceType::NSEC3) {
            if !rrset.is_signed() {
                return false;
            }
            any = true;
        }
    }
    any
}

/// `*.<source>` where `source` is the rightmost `labels` labels of `owner`,
/// or `None` when the owner was not synthesized
pub fn wildcard_name(owner: &Name, labels: u8) -> Option<Name> {
    let labels = usize::from(labels);
    let owner_labels = owner.label_count() - usize::from(owner.is_wildcard());
    if labels >= owner_labels {
        return None;
    }
    owner.trim_to(labels).wildcard().ok()
}

/// The name an RRset was expanded from (the wildcard's parent), if its
/// signatures say it was. Signatures disagreeing about the label count
/// make the set unusable.
pub fn rrset_wildcard(rrset: &RRset) -> Result<Option<Name>, DnsSecError> {
    let mut labels = rrset.rrsigs().map(|sig| sig.labels);
    let Some(first) = labels.next() else {
        return Ok(None);
    };
    if let Some(other) = labels.find(|&l| l != first) {
        return Err(DnsSecError::LabelCount { labels: other });
    }
    Ok(wildcard_name(rrset.name(), first).and_then(|wildcard| wildcard.parent()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{
        enums::DNSResourceClass,
        rdata::{DNSResourceData, TypeBitmap},
        resource::DNSResource,
    };
    use crate::dnssec::status::SecurityStatus;

    fn n(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    fn ds(algorithm: u8, digest_type: u8) -> DNSResource {
        DNSResource::new(
            n("example."),
            DNSResourceClass::IN,
            3600,
            DNSResourceData::DS(DsData {
                key_tag: 1,
                algorithm,
                digest_type,
                digest: vec![0; 32],
            }),
        )
    }

    #[test]
    fn test_favorite_digest() {
        let config = ValidatorConfig::default();
        let set = RRset::from_records(vec![ds(13, 1), ds(13, 2)]).unwrap();
        assert_eq!(favorite_ds_digest_id(&set, &config), 2);

        // SHA-256 only usable with an unsupported algorithm
        let set = RRset::from_records(vec![ds(13, 1), ds(200, 2)]).unwrap();
        assert_eq!(favorite_ds_digest_id(&set, &config), 1);

        let set = RRset::from_records(vec![ds(13, 3)]).unwrap();
        assert_eq!(favorite_ds_digest_id(&set, &config), 0);
        assert!(at_least_one_supported_algorithm(&set, &config));

        let config = ValidatorConfig {
            disabled_digests: vec![DigestType::Sha256],
            ..Default::default()
        };
        let set = RRset::from_records(vec![ds(13, 1), ds(13, 2)]).unwrap();
        assert_eq!(favorite_ds_digest_id(&set, &config), 1);
    }

    #[test]
    fn test_closest_encloser_ignores_order() {
        let qname = n("a.b.c.example.");
        let owners = [n("x.example."), n("z.c.example."), n("example.")];
        let reversed: Vec<Name> = owners.iter().rev().cloned().collect();
        assert_eq!(closest_encloser(owners.iter(), &qname), Some(n("c.example.")));
        assert_eq!(closest_encloser(reversed.iter(), &qname), Some(n("c.example.")));
        assert_eq!(closest_encloser(std::iter::empty::<&Name>(), &qname), None);
    }

    #[test]
    fn test_nsec_proves_no_ds() {
        use DNSResourceType::*;
        let nsec = |types: &[DNSResourceType]| NsecData {
            next_domain: n("z.example."),
            types: TypeBitmap::new(types.iter().copied()),
        };
        let owner = n("sub.example.");
        assert!(nsec_proves_no_ds(&nsec(&[NS, NSEC, RRSIG]), &owner).is_secure());
        assert!(nsec_proves_no_ds(&nsec(&[NS, DS, NSEC, RRSIG]), &owner).is_bogus());
        assert!(nsec_proves_no_ds(&nsec(&[NS, SOA, NSEC, RRSIG]), &owner).is_bogus());
        assert_eq!(
            nsec_proves_no_ds(&nsec(&[A, NSEC, RRSIG]), &owner).status,
            SecurityStatus::Indeterminate
        );
        assert!(nsec_proves_no_ds(&nsec(&[NS, SOA, NSEC, RRSIG]), &Name::root()).is_secure());
    }

    #[test]
    fn test_wildcard_name() {
        assert_eq!(wildcard_name(&n("a.b.example."), 2), Some(n("*.b.example.")));
        assert_eq!(wildcard_name(&n("a.b.example."), 3), None);
        assert_eq!(wildcard_name(&n("*.example."), 1), None);
    }
}
