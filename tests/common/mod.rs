//! Shared fixtures: deterministic signed zones and an in-memory upstream
//! that answers from them the way an authoritative hierarchy would.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use ring::signature::{Ed25519KeyPair, KeyPair};
use rustc_hash::FxHashMap;

use heimdall_dnssec::{
    DNSPacket, DnsTransport, TransportError, ValidatingResolver, ValidatorConfig,
    dns::{
        constants::DNSRcode,
        edns::EdnsOpt,
        enums::{DNSResourceClass, DNSResourceType},
        header::DNSHeader,
        name::Name,
        question::DNSQuestion,
        rdata::{
            DNSKEY_FLAG_SEP, DNSKEY_FLAG_ZONE, DNSKEY_PROTOCOL, DNSResourceData, DnsKeyData,
            DsData, NSEC3_FLAG_OPT_OUT, Nsec3Data, NsecData, RrsigData, SoaData,
        },
        resource::DNSResource,
    },
    dnssec::{
        DigestType, RRset, TrustAnchorSource, calculate_key_tag,
        nsec3::{NSEC3_HASH_SHA1, encode_hash, hash_name},
        verifier::signature_input,
    },
};

/// Validation clock used by every fixture
pub const NOW: u32 = 1_700_000_000;
pub const TTL: u32 = 300;
pub const DAY: u32 = 86_400;

pub fn name(s: &str) -> Name {
    Name::from_ascii(s).expect("valid test name")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn query(qname: &str, qtype: DNSResourceType) -> DNSPacket {
    let mut packet = DNSPacket::query(name(qname), qtype, DNSResourceClass::IN);
    packet.header.id = 0x2b1d;
    packet
}

pub fn a_record(owner: &str, last: u8) -> DNSResource {
    DNSResource::new(
        name(owner),
        DNSResourceClass::IN,
        TTL,
        DNSResourceData::A([192, 0, 2, last].into()),
    )
}

/// Ed25519 zone key derived from a one-byte seed
pub struct TestKey {
    pair: Ed25519KeyPair,
    pub dnskey: DnsKeyData,
}

impl TestKey {
    pub fn new(seed: u8) -> Self {
        let pair = Ed25519KeyPair::from_seed_unchecked(&[seed; 32]).expect("ed25519 seed");
        let dnskey = DnsKeyData {
            flags: DNSKEY_FLAG_ZONE | DNSKEY_FLAG_SEP,
            protocol: DNSKEY_PROTOCOL,
            algorithm: 15,
            public_key: pair.public_key().as_ref().to_vec(),
        };
        Self { pair, dnskey }
    }

    pub fn tag(&self) -> u16 {
        calculate_key_tag(&self.dnskey)
    }

    pub fn record(&self, zone: &Name) -> DNSResource {
        DNSResource::new(
            zone.clone(),
            DNSResourceClass::IN,
            TTL,
            DNSResourceData::DNSKEY(self.dnskey.clone()),
        )
    }

    pub fn ds(&self, zone: &Name) -> DNSResource {
        let digest = DigestType::Sha256
            .ds_digest(zone, &self.dnskey)
            .expect("sha256 digest");
        DNSResource::new(
            zone.clone(),
            DNSResourceClass::IN,
            TTL,
            DNSResourceData::DS(DsData {
                key_tag: self.tag(),
                algorithm: 15,
                digest_type: 2,
                digest,
            }),
        )
    }

    pub fn sign(&self, rrset: &RRset, signer: &Name, window: (u32, u32)) -> RRset {
        let owner = rrset.name();
        let mut sig = RrsigData {
            type_covered: rrset.rtype(),
            algorithm: 15,
            labels: (owner.label_count() - usize::from(owner.is_wildcard())) as u8,
            original_ttl: TTL,
            expiration: window.1,
            inception: window.0,
            key_tag: self.tag(),
            signer_name: signer.clone(),
            signature: Vec::new(),
        };
        sig.signature = self
            .pair
            .sign(&signature_input(&sig, rrset))
            .as_ref()
            .to_vec();
        rrset.clone().with_sigs([DNSResource::new(
            owner.clone(),
            rrset.rclass(),
            TTL,
            DNSResourceData::RRSIG(sig),
        )])
    }
}

#[derive(Clone, Debug)]
pub enum Denial {
    Nsec,
    Nsec3 {
        iterations: u16,
        salt: Vec<u8>,
        opt_out: bool,
    },
}

/// One authoritative zone. Signed zones sign every authoritative RRset on
/// the fly and serve NSEC or NSEC3 chains computed from their contents.
pub struct TestZone {
    pub apex: Name,
    key: Option<TestKey>,
    denial: Denial,
    window: (u32, u32),
    records: Vec<DNSResource>,
    cuts: BTreeSet<Name>,
}

impl TestZone {
    pub fn signed(apex: &str, seed: u8) -> Self {
        let mut zone = Self::unsigned(apex);
        let key = TestKey::new(seed);
        zone.records.push(key.record(&zone.apex));
        zone.key = Some(key);
        zone
    }

    pub fn unsigned(apex: &str) -> Self {
        let apex = name(apex);
        let ns = apex.prepend_label(b"ns").expect("ns name");
        let soa = SoaData {
            mname: ns.clone(),
            rname: apex.prepend_label(b"hostmaster").expect("rname"),
            serial: 2024010101,
            refresh: 3600,
            retry: 600,
            expire: 7 * DAY,
            minimum: TTL,
        };
        Self {
            records: vec![
                DNSResource::new(apex.clone(), DNSResourceClass::IN, TTL, DNSResourceData::SOA(soa)),
                DNSResource::new(apex.clone(), DNSResourceClass::IN, TTL, DNSResourceData::NS(ns)),
            ],
            apex,
            key: None,
            denial: Denial::Nsec,
            window: (NOW - DAY, NOW + 30 * DAY),
            cuts: BTreeSet::new(),
        }
    }

    pub fn with_nsec3(mut self, iterations: u16, opt_out: bool) -> Self {
        self.denial = Denial::Nsec3 {
            iterations,
            salt: vec![0xaa, 0xbb, 0xcc, 0xdd],
            opt_out,
        };
        self
    }

    /// Validity window stamped on every signature
    pub fn with_window(mut self, inception: u32, expiration: u32) -> Self {
        self.window = (inception, expiration);
        self
    }

    pub fn key(&self) -> Option<&TestKey> {
        self.key.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.key.is_some()
    }

    pub fn add(&mut self, owner: &str, rdata: DNSResourceData) -> &mut Self {
        self.records
            .push(DNSResource::new(name(owner), DNSResourceClass::IN, TTL, rdata));
        self
    }

    pub fn add_a(&mut self, owner: &str, last: u8) -> &mut Self {
        self.add(owner, DNSResourceData::A([192, 0, 2, last].into()))
    }

    pub fn add_cname(&mut self, owner: &str, target: &str) -> &mut Self {
        self.add(owner, DNSResourceData::CNAME(name(target)))
    }

    /// Delegate the child's apex; a signed child also gets its DS here.
    pub fn delegate(&mut self, child: &TestZone) -> &mut Self {
        let cut = child.apex.clone();
        let ns = cut.prepend_label(b"ns").expect("ns name");
        self.records
            .push(DNSResource::new(cut.clone(), DNSResourceClass::IN, TTL, DNSResourceData::NS(ns)));
        if let Some(key) = child.key() {
            self.records.push(key.ds(&cut));
        }
        self.cuts.insert(cut);
        self
    }

    pub fn anchor(&self) -> TrustAnchorSource {
        let key = self.key().expect("anchors come from signed zones");
        TrustAnchorSource::Records(vec![key.ds(&self.apex)])
    }

    pub fn dnskey_anchor(&self) -> TrustAnchorSource {
        let key = self.key().expect("anchors come from signed zones");
        TrustAnchorSource::Records(vec![key.record(&self.apex)])
    }

    pub fn sign(&self, rrset: &RRset) -> RRset {
        match &self.key {
            Some(key) => key.sign(rrset, &self.apex, self.window),
            None => rrset.clone(),
        }
    }

    /// Names this zone is authoritative for: nothing below its cuts
    pub fn in_zone(&self, owner: &Name) -> bool {
        owner.is_subdomain_of(&self.apex)
            && !self.cuts.iter().any(|cut| owner.is_strict_subdomain_of(cut))
    }

    fn is_insecure_cut(&self, owner: &Name) -> bool {
        self.cuts.contains(owner) && !self.types_at(owner).contains(&DNSResourceType::DS)
    }

    /// The signed RRset at `owner`, unsigned for delegation NS sets
    pub fn rrset(&self, owner: &Name, rtype: DNSResourceType) -> Option<RRset> {
        if !self.in_zone(owner) {
            return None;
        }
        let records = self
            .records
            .iter()
            .filter(|r| &r.name == owner && r.rtype == rtype)
            .cloned()
            .collect();
        let rrset = RRset::from_records(records)?;
        if rtype == DNSResourceType::NS && self.cuts.contains(owner) {
            return Some(rrset);
        }
        Some(self.sign(&rrset))
    }

    fn owners(&self) -> BTreeSet<Name> {
        self.records
            .iter()
            .map(|r| r.name.clone())
            .filter(|n| self.in_zone(n))
            .collect()
    }

    fn existing(&self) -> BTreeSet<Name> {
        let owners = self.owners();
        let mut names = owners.clone();
        for owner in owners {
            let mut current = owner.parent();
            while let Some(parent) = current {
                if !parent.is_subdomain_of(&self.apex) {
                    break;
                }
                current = parent.parent();
                names.insert(parent);
            }
        }
        names
    }

    fn types_at(&self, owner: &Name) -> BTreeSet<DNSResourceType> {
        self.records
            .iter()
            .filter(|r| &r.name == owner)
            .map(|r| r.rtype)
            .collect()
    }

    pub fn nsec_chain(&self) -> Vec<RRset> {
        if !self.is_signed() || !matches!(self.denial, Denial::Nsec) {
            return Vec::new();
        }
        let owners: Vec<Name> = self.owners().into_iter().collect();
        owners
            .iter()
            .enumerate()
            .map(|(i, owner)| {
                let mut types = self.types_at(owner);
                types.insert(DNSResourceType::NSEC);
                types.insert(DNSResourceType::RRSIG);
                let data = NsecData {
                    next_domain: owners[(i + 1) % owners.len()].clone(),
                    types: types.into_iter().collect(),
                };
                self.sign(&RRset::new(DNSResource::new(
                    owner.clone(),
                    DNSResourceClass::IN,
                    TTL,
                    DNSResourceData::NSEC(data),
                )))
            })
            .collect()
    }

    /// (owner hash, next hash, signed NSEC3 set), in hash order
    fn nsec3_entries(&self) -> Vec<(Vec<u8>, Vec<u8>, RRset)> {
        let Denial::Nsec3 {
            iterations,
            salt,
            opt_out,
        } = &self.denial
        else {
            return Vec::new();
        };
        if !self.is_signed() {
            return Vec::new();
        }

        let mut hashed: Vec<(Vec<u8>, Name)> = self
            .existing()
            .into_iter()
            .filter(|n| !(*opt_out && self.is_insecure_cut(n)))
            .map(|n| (hash_name(&n, salt, *iterations), n))
            .collect();
        hashed.sort_by(|a, b| a.0.cmp(&b.0));

        let flags = if *opt_out { NSEC3_FLAG_OPT_OUT } else { 0 };
        (0..hashed.len())
            .map(|i| {
                let (hash, owner) = &hashed[i];
                let next = hashed[(i + 1) % hashed.len()].0.clone();
                let mut types = self.types_at(owner);
                let signed_data = !types.is_empty()
                    && !(self.cuts.contains(owner) && !types.contains(&DNSResourceType::DS));
                if signed_data {
                    types.insert(DNSResourceType::RRSIG);
                }
                let data = Nsec3Data {
                    hash_algorithm: NSEC3_HASH_SHA1,
                    flags,
                    iterations: *iterations,
                    salt: salt.clone(),
                    next_hashed: next.clone(),
                    types: types.into_iter().collect(),
                };
                let hashed_owner = self
                    .apex
                    .prepend_label(encode_hash(hash).as_bytes())
                    .expect("hashed owner");
                let rrset = self.sign(&RRset::new(DNSResource::new(
                    hashed_owner,
                    DNSResourceClass::IN,
                    TTL,
                    DNSResourceData::NSEC3(data),
                )));
                (hash.clone(), next, rrset)
            })
            .collect()
    }

    pub fn nsec3_chain(&self) -> Vec<RRset> {
        self.nsec3_entries().into_iter().map(|(_, _, rrset)| rrset).collect()
    }

    fn hash(&self, owner: &Name) -> Vec<u8> {
        match &self.denial {
            Denial::Nsec3 {
                iterations, salt, ..
            } => hash_name(owner, salt, *iterations),
            Denial::Nsec => Vec::new(),
        }
    }

    pub fn nsec_at(&self, owner: &Name) -> Option<RRset> {
        self.nsec_chain().into_iter().find(|r| r.name() == owner)
    }

    pub fn nsec_covering(&self, target: &Name) -> Option<RRset> {
        self.nsec_chain().into_iter().find(|rrset| {
            let Some(DNSResourceData::NSEC(data)) = rrset.records().first().map(|r| &r.rdata)
            else {
                return false;
            };
            covers(rrset.name(), &data.next_domain, target)
        })
    }

    pub fn nsec3_matching(&self, target: &Name) -> Option<RRset> {
        let hash = self.hash(target);
        self.nsec3_entries()
            .into_iter()
            .find(|(owner, _, _)| *owner == hash)
            .map(|(_, _, rrset)| rrset)
    }

    pub fn nsec3_covering(&self, target: &Name) -> Option<RRset> {
        let hash = self.hash(target);
        self.nsec3_entries()
            .into_iter()
            .find(|(owner, next, _)| covers(owner, next, &hash))
            .map(|(_, _, rrset)| rrset)
    }

    pub fn closest_encloser(&self, qname: &Name) -> Name {
        let existing = self.existing();
        let mut current = qname.parent();
        while let Some(candidate) = current {
            if existing.contains(&candidate) {
                return candidate;
            }
            current = candidate.parent();
        }
        self.apex.clone()
    }

    fn soa(&self) -> Vec<RRset> {
        self.rrset(&self.apex, DNSResourceType::SOA)
            .into_iter()
            .collect()
    }

    fn nodata_proof(&self, owner: &Name) -> Vec<RRset> {
        match self.denial {
            Denial::Nsec => self
                .nsec_at(owner)
                .or_else(|| self.nsec_covering(owner))
                .into_iter()
                .collect(),
            Denial::Nsec3 { .. } => match self.nsec3_matching(owner) {
                Some(rrset) => vec![rrset],
                // opted-out delegation: closest encloser plus covered next closer
                None => {
                    let encloser = self.closest_encloser(owner);
                    let next_closer = owner.trim_to(encloser.label_count() + 1);
                    [
                        self.nsec3_matching(&encloser),
                        self.nsec3_covering(&next_closer),
                    ]
                    .into_iter()
                    .flatten()
                    .collect()
                }
            },
        }
    }

    /// Proof that no closer match than the wildcard exists
    fn wildcard_proof(&self, qname: &Name, encloser: &Name) -> Vec<RRset> {
        match self.denial {
            Denial::Nsec => self.nsec_covering(qname).into_iter().collect(),
            Denial::Nsec3 { .. } => {
                let next_closer = qname.trim_to(encloser.label_count() + 1);
                self.nsec3_covering(&next_closer).into_iter().collect()
            }
        }
    }

    fn nxdomain_proof(&self, qname: &Name) -> Vec<RRset> {
        let encloser = self.closest_encloser(qname);
        let wildcard = encloser.wildcard().expect("wildcard name");
        let pieces = match self.denial {
            Denial::Nsec => vec![self.nsec_covering(qname), self.nsec_covering(&wildcard)],
            Denial::Nsec3 { .. } => {
                let next_closer = qname.trim_to(encloser.label_count() + 1);
                vec![
                    self.nsec3_matching(&encloser),
                    self.nsec3_covering(&next_closer),
                    self.nsec3_covering(&wildcard),
                ]
            }
        };
        let mut proof: Vec<RRset> = Vec::new();
        for piece in pieces.into_iter().flatten() {
            if !proof.iter().any(|p| p.name() == piece.name()) {
                proof.push(piece);
            }
        }
        proof
    }

    /// The authoritative answer for an in-zone question. CNAME chains are
    /// chased while the target stays inside this zone.
    pub fn answer(&self, qname: &Name, qtype: DNSResourceType) -> DNSPacket {
        let mut packet = response_for(qname, qtype);
        let existing = self.existing();

        if !existing.contains(qname) {
            let encloser = self.closest_encloser(qname);
            let wildcard = encloser.wildcard().expect("wildcard name");
            if existing.contains(&wildcard) {
                match self.rrset(&wildcard, qtype) {
                    Some(rrset) => push(&mut packet.answers, &rename(&rrset, qname)),
                    None => {
                        push_all(&mut packet.authorities, &self.soa());
                        push_all(&mut packet.authorities, &self.nodata_proof(&wildcard));
                    }
                }
                push_all(&mut packet.authorities, &self.wildcard_proof(qname, &encloser));
                return packet;
            }
            packet.header.rcode = DNSRcode::NXDOMAIN;
            push_all(&mut packet.authorities, &self.soa());
            push_all(&mut packet.authorities, &self.nxdomain_proof(qname));
            return packet;
        }

        if let Some(rrset) = self.rrset(qname, qtype) {
            push(&mut packet.answers, &rrset);
            return packet;
        }

        let mut current = qname.clone();
        for _ in 0..8 {
            let Some(cname) = self.rrset(&current, DNSResourceType::CNAME) else {
                break;
            };
            push(&mut packet.answers, &cname);
            let Some(DNSResourceData::CNAME(target)) = cname.records().first().map(|r| r.rdata.clone())
            else {
                break;
            };
            if !self.in_zone(&target) {
                return packet;
            }
            if let Some(rrset) = self.rrset(&target, qtype) {
                push(&mut packet.answers, &rrset);
                return packet;
            }
            if !existing.contains(&target) {
                packet.header.rcode = DNSRcode::NXDOMAIN;
                push_all(&mut packet.authorities, &self.soa());
                push_all(&mut packet.authorities, &self.nxdomain_proof(&target));
                return packet;
            }
            current = target;
        }

        push_all(&mut packet.authorities, &self.soa());
        push_all(&mut packet.authorities, &self.nodata_proof(&current));
        packet
    }
}

fn covers<T: Ord + ?Sized>(owner: &T, next: &T, target: &T) -> bool {
    if owner < next {
        owner < target && target < next
    } else {
        target > owner || target < next
    }
}

/// Move an RRset (and its signatures) to a new owner, as wildcard
/// expansion does on the wire.
pub fn rename(rrset: &RRset, owner: &Name) -> RRset {
    let moved = |r: &DNSResource| DNSResource {
        name: owner.clone(),
        ..r.clone()
    };
    let records = rrset.records().iter().map(moved).collect();
    RRset::from_records(records)
        .expect("non-empty rrset")
        .with_sigs(rrset.sigs().iter().map(moved))
}

pub fn push(section: &mut Vec<DNSResource>, rrset: &RRset) {
    section.extend(rrset.to_records());
}

pub fn push_all(section: &mut Vec<DNSResource>, rrsets: &[RRset]) {
    for rrset in rrsets {
        push(section, rrset);
    }
}

pub fn response_for(qname: &Name, qtype: DNSResourceType) -> DNSPacket {
    let mut edns = EdnsOpt::new();
    edns.set_do_flag(true);
    DNSPacket {
        header: DNSHeader {
            qr: true,
            aa: true,
            rd: true,
            ra: true,
            ..Default::default()
        },
        questions: vec![DNSQuestion::new(qname.clone(), qtype, DNSResourceClass::IN)],
        edns: Some(edns),
        ..Default::default()
    }
}

/// Remove the signatures covering records owned by `owner`
pub fn strip_sigs(packet: &mut DNSPacket, owner: &Name) {
    for section in [&mut packet.answers, &mut packet.authorities] {
        section.retain(|r| !(r.rtype == DNSResourceType::RRSIG && &r.name == owner));
    }
}

/// Remove whole records by owner and type, signatures included
pub fn drop_records(packet: &mut DNSPacket, owner: &Name, rtype: DNSResourceType) {
    for section in [&mut packet.answers, &mut packet.authorities] {
        section.retain(|r| {
            let covered = r.as_rrsig().map(|sig| sig.type_covered).unwrap_or(r.rtype);
            !(&r.name == owner && covered == rtype)
        });
    }
}

type QueryKey = (Name, DNSResourceType);

/// In-memory upstream answering from a set of zones. DS questions go to
/// the parent side of a cut, everything else to the deepest zone.
pub struct MockUpstream {
    zones: Vec<TestZone>,
    overrides: Mutex<FxHashMap<QueryKey, DNSPacket>>,
    failures: Mutex<FxHashMap<QueryKey, TransportError>>,
    log: Mutex<Vec<QueryKey>>,
}

impl MockUpstream {
    pub fn new(zones: Vec<TestZone>) -> Self {
        Self {
            zones,
            overrides: Mutex::new(FxHashMap::default()),
            failures: Mutex::new(FxHashMap::default()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn zone(&self, apex: &str) -> &TestZone {
        let apex = name(apex);
        self.zones
            .iter()
            .find(|z| z.apex == apex)
            .expect("zone is served")
    }

    pub fn override_response(&self, qname: &str, qtype: DNSResourceType, packet: DNSPacket) {
        self.overrides.lock().insert((name(qname), qtype), packet);
    }

    pub fn fail(&self, qname: &str, qtype: DNSResourceType, error: TransportError) {
        self.failures.lock().insert((name(qname), qtype), error);
    }

    pub fn queries(&self) -> Vec<QueryKey> {
        self.log.lock().clone()
    }

    pub fn was_asked(&self, qname: &str, qtype: DNSResourceType) -> bool {
        let key = (name(qname), qtype);
        self.log.lock().iter().any(|q| *q == key)
    }

    fn zone_for(&self, qname: &Name, qtype: DNSResourceType) -> Option<&TestZone> {
        self.zones
            .iter()
            .filter(|z| qname.is_subdomain_of(&z.apex))
            .filter(|z| !(qtype == DNSResourceType::DS && z.apex == *qname && !qname.is_root()))
            .max_by_key(|z| z.apex.label_count())
    }

    /// What the hierarchy would answer, before any override
    pub fn resolve(&self, qname: &Name, qtype: DNSResourceType) -> DNSPacket {
        self.resolve_depth(qname, qtype, 0)
    }

    fn resolve_depth(&self, qname: &Name, qtype: DNSResourceType, depth: usize) -> DNSPacket {
        let Some(zone) = self.zone_for(qname, qtype) else {
            let mut packet = response_for(qname, qtype);
            packet.header.rcode = DNSRcode::REFUSED;
            return packet;
        };
        let mut packet = zone.answer(qname, qtype);

        let dangling = packet.answers.iter().find_map(|r| match &r.rdata {
            DNSResourceData::CNAME(target) if !zone.in_zone(target) => Some(target.clone()),
            _ => None,
        });
        if let (Some(target), true) = (dangling, depth < 8) {
            let tail = self.resolve_depth(&target, qtype, depth + 1);
            packet.answers.extend(tail.answers);
            packet.authorities = tail.authorities;
            packet.header.rcode = tail.header.rcode;
        }
        packet
    }
}

#[async_trait]
impl DnsTransport for MockUpstream {
    async fn send(&self, query: DNSPacket) -> Result<DNSPacket, TransportError> {
        let question = query
            .question()
            .cloned()
            .ok_or_else(|| TransportError::Other("query without question".to_string()))?;
        let key = (question.name.clone(), question.qtype);
        self.log.lock().push(key.clone());

        if let Some(error) = self.failures.lock().get(&key) {
            return Err(error.clone());
        }
        let mut response = match self.overrides.lock().get(&key) {
            Some(packet) => packet.clone(),
            None => self.resolve(&question.name, question.qtype),
        };
        response.header.id = query.header.id;
        response.header.rd = query.header.rd;
        response.header.cd = query.header.cd;
        Ok(response)
    }
}

/// Root signed with seed 1 delegating to a signed `example.` (seed 2)
pub fn signed_hierarchy(example: TestZone) -> Vec<TestZone> {
    let mut root = TestZone::signed(".", 1);
    root.delegate(&example);
    vec![root, example]
}

pub fn resolver(upstream: &Arc<MockUpstream>) -> ValidatingResolver<Arc<MockUpstream>> {
    resolver_with(upstream, ValidatorConfig::default())
}

pub fn resolver_with(
    upstream: &Arc<MockUpstream>,
    config: ValidatorConfig,
) -> ValidatingResolver<Arc<MockUpstream>> {
    init_tracing();
    let resolver = ValidatingResolver::new(upstream.clone(), config).with_fixed_time(NOW);
    resolver
        .load_trust_anchors(&upstream.zone(".").anchor())
        .expect("root anchor loads");
    resolver
}
