//! Denial of existence with NSEC3 records (RFC 5155 §8).

use std::cell::RefCell;

use ring::digest;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::algorithm::DnsSecAlgorithm;
use super::errors::DnsSecError;
use super::rrset::RRset;
use super::status::Verdict;
use crate::dns::{
    enums::DNSResourceType,
    name::Name,
    rdata::{NSEC3_FLAG_OPT_OUT, Nsec3Data, base32hex_decode, base32hex_encode},
};

/// The only NSEC3 hash algorithm defined (RFC 5155 §11)
pub const NSEC3_HASH_SHA1: u8 = 1;

/// Iterated, salted SHA-1 of the canonical wire form of `name` (RFC 5155 §5)
pub fn hash_name(name: &Name, salt: &[u8], iterations: u16) -> Vec<u8> {
    let mut input = name.to_canonical_wire();
    input.extend_from_slice(salt);
    let mut hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &input)
        .as_ref()
        .to_vec();
    for _ in 0..iterations {
        hash.extend_from_slice(salt);
        hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &hash)
            .as_ref()
            .to_vec();
    }
    hash
}

/// Owner label form of a hash
pub fn encode_hash(hash: &[u8]) -> String {
    base32hex_encode(hash)
}

/// Smallest key size among the zone keys, which selects the iteration ceiling
pub fn smallest_key_bits(keys: &RRset) -> u32 {
    keys.records()
        .iter()
        .filter_map(|r| r.as_dnskey())
        .filter_map(|key| DnsSecAlgorithm::from_u8(key.algorithm)?.key_size_bits(&key.public_key))
        .min()
        .unwrap_or(0)
}

struct Entry<'a> {
    owner_hash: Vec<u8>,
    data: &'a Nsec3Data,
}

/// Closest encloser proof pieces (RFC 5155 §8.3)
struct Encloser<'a> {
    closest: Name,
    closest_nsec: &'a Nsec3Data,
    next_closer: Option<Name>,
}

/// The usable NSEC3 records of one zone from one response.
///
/// Records with an unknown hash, unknown flags, or parameters differing from
/// the first usable record are ignored.
pub struct Nsec3Proof<'a> {
    zone: Name,
    salt: Vec<u8>,
    iterations: u16,
    entries: Vec<Entry<'a>>,
    hashes: RefCell<FxHashMap<Name, Vec<u8>>>,
}

impl<'a> Nsec3Proof<'a> {
    /// `None` when no NSEC3 record of `zone` is usable
    pub fn new(rrsets: &[&'a RRset], zone: &Name) -> Option<Self> {
        let mut params: Option<(Vec<u8>, u16)> = None;
        let mut entries = Vec::new();

        for rrset in rrsets {
            if rrset.name().parent().as_ref() != Some(zone) {
                trace!("NSEC3 {} is not directly below {}", rrset.name(), zone);
                continue;
            }
            let Some(owner_hash) = rrset
                .name()
                .first_label()
                .and_then(|label| std::str::from_utf8(label).ok())
                .and_then(base32hex_decode)
            else {
                continue;
            };

            for data in rrset.records().iter().filter_map(|r| r.as_nsec3()) {
                if data.hash_algorithm != NSEC3_HASH_SHA1 || data.flags & !NSEC3_FLAG_OPT_OUT != 0 {
                    continue;
                }
                match &params {
                    None => params = Some((data.salt.clone(), data.iterations)),
                    Some((salt, iterations)) => {
                        if *salt != data.salt || *iterations != data.iterations {
                            continue;
                        }
                    }
                }
                entries.push(Entry {
                    owner_hash: owner_hash.clone(),
                    data,
                });
            }
        }

        let (salt, iterations) = params?;
        Some(Self {
            zone: zone.clone(),
            salt,
            iterations,
            entries,
            hashes: RefCell::new(FxHashMap::default()),
        })
    }

    pub fn zone(&self) -> &Name {
        &self.zone
    }

    pub fn iterations(&self) -> u16 {
        self.iterations
    }

    /// Insecure verdict when the iteration count is above `limit`
    pub fn check_iterations(&self, limit: u16) -> Option<Verdict> {
        (self.iterations > limit).then(|| {
            debug!(
                "NSEC3 proof for {} ignored: {} iterations above {}",
                self.zone, self.iterations, limit
            );
            Verdict::insecure(DnsSecError::Nsec3Ignored {
                iterations: self.iterations,
                limit,
            })
        })
    }

    fn hash(&self, name: &Name) -> Vec<u8> {
        if let Some(hash) = self.hashes.borrow().get(name) {
            return hash.clone();
        }
        let hash = hash_name(name, &self.salt, self.iterations);
        trace!("NSEC3 hash of {} is {}", name, encode_hash(&hash));
        self.hashes.borrow_mut().insert(name.clone(), hash.clone());
        hash
    }

    fn find_match(&self, name: &Name) -> Option<&'a Nsec3Data> {
        let hash = self.hash(name);
        self.entries
            .iter()
            .find(|e| e.owner_hash == hash)
            .map(|e| e.data)
    }

    fn find_cover(&self, name: &Name) -> Option<&'a Nsec3Data> {
        let hash = self.hash(name);
        self.entries
            .iter()
            .find(|e| {
                let owner = &e.owner_hash;
                let next = &e.data.next_hashed;
                if owner < next {
                    *owner < hash && hash < *next
                } else {
                    // last record of the chain wraps around
                    *owner < hash || hash < *next
                }
            })
            .map(|e| e.data)
    }

    /// Longest ancestor-or-self of `qname` with a matching NSEC3
    fn closest_encloser(&self, qname: &Name) -> Option<Encloser<'a>> {
        if !qname.is_subdomain_of(&self.zone) {
            return None;
        }
        let mut candidate = qname.clone();
        let mut next_closer = None;
        loop {
            if let Some(data) = self.find_match(&candidate) {
                return Some(Encloser {
                    closest: candidate,
                    closest_nsec: data,
                    next_closer,
                });
            }
            if candidate == self.zone {
                return None;
            }
            let parent = candidate.parent()?;
            next_closer = Some(candidate);
            candidate = parent;
        }
    }

    /// A closest encloser at a delegation or DNAME belongs to another zone
    fn encloser_is_foreign(encloser: &Encloser<'_>) -> bool {
        let types = &encloser.closest_nsec.types;
        types.contains(DNSResourceType::DNAME)
            || (types.contains(DNSResourceType::NS) && !types.contains(DNSResourceType::SOA))
    }

    /// NXDOMAIN: closest encloser, covered next closer and covered wildcard.
    /// An opt-out next closer span makes the answer insecure.
    pub fn prove_name_error(&self, qname: &Name) -> Verdict {
        let fail = || Verdict::bogus(DnsSecError::NxdomainProofFailed(qname.to_string()));

        let Some(encloser) = self.closest_encloser(qname) else {
            debug!("NSEC3 NXDOMAIN proof for {}: no closest encloser", qname);
            return fail();
        };
        if Self::encloser_is_foreign(&encloser) {
            return fail().wrap("closest encloser is a delegation");
        }
        let Some(next_closer) = &encloser.next_closer else {
            return fail().wrap("name exists");
        };
        let Some(nc_nsec) = self.find_cover(next_closer) else {
            debug!("NSEC3 NXDOMAIN proof for {}: next closer not covered", qname);
            return fail().wrap("next closer not covered");
        };
        if nc_nsec.opt_out() {
            return Verdict::insecure(DnsSecError::Nsec3OptOut(next_closer.to_string()));
        }

        let Ok(wildcard) = encloser.closest.wildcard() else {
            return fail();
        };
        if self.find_cover(&wildcard).is_none() {
            debug!("NSEC3 NXDOMAIN proof for {}: wildcard {} not denied", qname, wildcard);
            return fail().wrap("wildcard not denied");
        }
        Verdict::secure()
    }

    /// NODATA for `qname`/`qtype`
    pub fn prove_nodata(&self, qname: &Name, qtype: DNSResourceType) -> Verdict {
        let fail = || Verdict::bogus(DnsSecError::NodataProofFailed(qname.to_string()));

        if let Some(data) = self.find_match(qname) {
            if data.types.contains(qtype) || data.types.contains(DNSResourceType::CNAME) {
                return fail().wrap("type present");
            }
            let has_ns = data.types.contains(DNSResourceType::NS);
            let has_soa = data.types.contains(DNSResourceType::SOA);
            if qtype == DNSResourceType::DS {
                if has_soa && !qname.is_root() {
                    return fail().wrap("child apex NSEC3");
                }
            } else if has_ns && !has_soa {
                return fail().wrap("delegation NSEC3");
            }
            return Verdict::secure();
        }

        let Some(encloser) = self.closest_encloser(qname) else {
            return fail().wrap("no closest encloser");
        };
        let Some(next_closer) = &encloser.next_closer else {
            return fail();
        };
        let nc_nsec = self.find_cover(next_closer);

        // wildcard NODATA (RFC 5155 §8.7)
        if let Ok(wildcard) = encloser.closest.wildcard() {
            if let Some(data) = self.find_match(&wildcard) {
                if nc_nsec.is_none()
                    || data.types.contains(qtype)
                    || data.types.contains(DNSResourceType::CNAME)
                {
                    return fail().wrap("wildcard");
                }
                return Verdict::secure();
            }
        }

        match nc_nsec {
            Some(nsec) if nsec.opt_out() => {
                Verdict::insecure(DnsSecError::Nsec3OptOut(next_closer.to_string()))
            }
            _ => fail(),
        }
    }

    /// A positive answer synthesized from `*.<source>`: the next closer
    /// name below `source` must be covered and nothing between may exist.
    pub fn prove_wildcard(&self, qname: &Name, source: &Name) -> Verdict {
        if self.find_match(qname).is_some() {
            return Verdict::bogus(DnsSecError::WildcardTooBroad(qname.to_string()));
        }
        if qname.label_count() <= source.label_count() {
            return Verdict::bogus(DnsSecError::WildcardUnproven(qname.to_string()));
        }
        let mut name = qname.parent();
        while let Some(current) = name {
            if current.label_count() <= source.label_count() {
                break;
            }
            if self.find_match(&current).is_some() {
                return Verdict::bogus(DnsSecError::WildcardTooBroad(qname.to_string()));
            }
            name = current.parent();
        }

        let next_closer = qname.trim_to(source.label_count() + 1);
        match self.find_cover(&next_closer) {
            Some(_) => Verdict::secure(),
            None => Verdict::bogus(DnsSecError::WildcardUnproven(qname.to_string())),
        }
    }

    /// No DS at `qname`. Secure means a delegation without DS is proven,
    /// insecure an opt-out span, indeterminate that `qname` is no zone cut.
    pub fn prove_no_ds(&self, qname: &Name) -> Verdict {
        let fail = || Verdict::bogus(DnsSecError::DsBogusProof(qname.to_string()));

        if let Some(data) = self.find_match(qname) {
            let types = &data.types;
            if types.contains(DNSResourceType::DS) || types.contains(DNSResourceType::CNAME) {
                return fail();
            }
            if types.contains(DNSResourceType::SOA) && !qname.is_root() {
                return fail().wrap("child apex NSEC3");
            }
            if !types.contains(DNSResourceType::NS) {
                return Verdict::indeterminate(DnsSecError::NodataProofFailed(qname.to_string()))
                    .wrap("not a delegation");
            }
            return Verdict::secure();
        }

        let Some(encloser) = self.closest_encloser(qname) else {
            return Verdict::bogus(DnsSecError::DsNoProof(qname.to_string()));
        };
        if Self::encloser_is_foreign(&encloser) {
            return fail().wrap("closest encloser is a delegation");
        }
        match encloser
            .next_closer
            .as_ref()
            .and_then(|nc| self.find_cover(nc).map(|nsec| (nc, nsec)))
        {
            Some((nc, nsec)) if nsec.opt_out() => {
                Verdict::insecure(DnsSecError::InsecureDelegationOptOut(nc.to_string()))
            }
            _ => Verdict::bogus(DnsSecError::DsNoProof(qname.to_string())),
        }
    }
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

    const SALT: [u8; 4] = [0xaa, 0xbb, 0xcc, 0xdd];

    fn n(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    #[test]
    fn test_rfc5155_vectors() {
        let hash = hash_name(&n("example."), &SALT, 12);
        assert_eq!(encode_hash(&hash), "0p9mhaveqvm6t7vbl5lop2u3t2rp3tom");
        let hash = hash_name(&n("a.example."), &SALT, 12);
        assert_eq!(encode_hash(&hash), "35mthgpgcu1qg68fab165klnsnk3dpvl");
        // case does not matter
        assert_eq!(
            hash_name(&n("A.EXAMPLE."), &SALT, 12),
            hash_name(&n("a.example."), &SALT, 12)
        );
    }

    /// NSEC3 chain over `names`, each record listing `types`
    fn chain(zone: &str, names: &[(&str, &[DNSResourceType])], flags: u8, iterations: u16) -> Vec<RRset> {
        let zone = n(zone);
        let mut hashed: Vec<(Vec<u8>, &[DNSResourceType])> = names
            .iter()
            .map(|(name, types)| (hash_name(&n(name), &SALT, iterations), *types))
            .collect();
        hashed.sort_by(|a, b| a.0.cmp(&b.0));
        (0..hashed.len())
            .map(|i| {
                let (hash, types) = &hashed[i];
                let next = hashed[(i + 1) % hashed.len()].0.clone();
                let owner = zone.prepend_label(encode_hash(hash).as_bytes()).unwrap();
                RRset::new(DNSResource::new(
                    owner,
                    DNSResourceClass::IN,
                    300,
                    DNSResourceData::NSEC3(Nsec3Data {
                        hash_algorithm: 1,
                        flags,
                        iterations,
                        salt: SALT.to_vec(),
                        next_hashed: next,
                        types: TypeBitmap::new(types.iter().copied()),
                    }),
                ))
            })
            .collect()
    }

    use DNSResourceType::*;

    #[test]
    fn test_name_error_needs_all_three() {
        let sets = chain(
            "example.",
            &[("example.", &[SOA, NS, DNSKEY]), ("a.example.", &[A]), ("b.example.", &[A])],
            0,
            1,
        );
        let refs: Vec<&RRset> = sets.iter().collect();
        let proof = Nsec3Proof::new(&refs, &n("example.")).unwrap();
        // with three names every other hash is covered by some record
        let verdict = proof.prove_name_error(&n("nonexistent.example."));
        assert_eq!(verdict.status, SecurityStatus::Secure, "{:?}", verdict);

        // drop the closest encloser record
        let apex_hash = encode_hash(&hash_name(&n("example."), &SALT, 1));
        let without_ce: Vec<&RRset> = sets
            .iter()
            .filter(|s| s.name().first_label() != Some(apex_hash.as_bytes()))
            .collect();
        let proof = Nsec3Proof::new(&without_ce, &n("example.")).unwrap();
        assert!(proof.prove_name_error(&n("nonexistent.example.")).is_bogus());

        // an existing name is no NXDOMAIN
        let proof = Nsec3Proof::new(&refs, &n("example.")).unwrap();
        assert!(proof.prove_name_error(&n("a.example.")).is_bogus());
    }

    #[test]
    fn test_opt_out_is_insecure() {
        let sets = chain("example.", &[("example.", &[SOA, NS]), ("a.example.", &[NS])], 1, 0);
        let refs: Vec<&RRset> = sets.iter().collect();
        let proof = Nsec3Proof::new(&refs, &n("example.")).unwrap();
        assert_eq!(
            proof.prove_name_error(&n("zz.example.")).status,
            SecurityStatus::Insecure
        );
        let verdict = proof.prove_no_ds(&n("unsigned.example."));
        assert_eq!(verdict.status, SecurityStatus::Insecure);
        assert_eq!(
            verdict.justification.unwrap().reason().key(),
            "insecure.ds.nsec3_optout"
        );
    }

    #[test]
    fn test_nodata_and_no_ds() {
        let sets = chain(
            "example.",
            &[("example.", &[SOA, NS]), ("www.example.", &[A]), ("sub.example.", &[NS])],
            0,
            0,
        );
        let refs: Vec<&RRset> = sets.iter().collect();
        let proof = Nsec3Proof::new(&refs, &n("example.")).unwrap();

        assert!(proof.prove_nodata(&n("www.example."), AAAA).is_secure());
        assert!(proof.prove_nodata(&n("www.example."), A).is_bogus());
        assert!(proof.prove_nodata(&n("sub.example."), A).is_bogus());
        assert!(proof.prove_nodata(&n("sub.example."), DS).is_secure());

        assert!(proof.prove_no_ds(&n("sub.example.")).is_secure());
        assert_eq!(
            proof.prove_no_ds(&n("www.example.")).status,
            SecurityStatus::Indeterminate
        );
    }

    #[test]
    fn test_wildcard_proofs() {
        let sets = chain(
            "example.",
            &[("example.", &[SOA, NS]), ("*.example.", &[A]), ("host.example.", &[A])],
            0,
            0,
        );
        let refs: Vec<&RRset> = sets.iter().collect();
        let proof = Nsec3Proof::new(&refs, &n("example.")).unwrap();

        assert!(proof.prove_wildcard(&n("other.example."), &n("example.")).is_secure());
        let too_broad = proof.prove_wildcard(&n("host.example."), &n("example."));
        assert_eq!(
            too_broad.justification.unwrap().reason().key(),
            "failed.positive.wildcard_too_broad"
        );
        // wildcard NODATA
        assert!(proof.prove_nodata(&n("other.example."), AAAA).is_secure());
        assert!(proof.prove_nodata(&n("other.example."), A).is_bogus());
    }

    #[test]
    fn test_iteration_ceiling_and_filtering() {
        let sets = chain("example.", &[("example.", &[SOA])], 0, 200);
        let refs: Vec<&RRset> = sets.iter().collect();
        let proof = Nsec3Proof::new(&refs, &n("example.")).unwrap();
        let verdict = proof.check_iterations(150).unwrap();
        assert_eq!(verdict.status, SecurityStatus::Insecure);
        assert!(proof.check_iterations(200).is_none());

        let odd_flags = chain("example.", &[("example.", &[SOA])], 0x02, 0);
        let refs: Vec<&RRset> = odd_flags.iter().collect();
        assert!(Nsec3Proof::new(&refs, &n("example.")).is_none());

        let foreign = chain("other.", &[("other.", &[SOA])], 0, 0);
        let refs: Vec<&RRset> = foreign.iter().collect();
        assert!(Nsec3Proof::new(&refs, &n("example.")).is_none());
    }
}
