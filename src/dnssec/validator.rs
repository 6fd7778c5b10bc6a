//! The validating resolver: forwards queries through a [`DnsTransport`],
//! then judges each response before it goes back to the caller.
//!
//! One top-level validation owns a [`ValidationSession`] holding the key
//! entries primed for it. Nothing in the session outlives the response, so
//! concurrent validations never share mutable state; only the trust anchor
//! store is shared.

use std::sync::Arc;

use futures::future::join_all;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, trace, warn};

use super::errors::DnsSecError;
use super::key_entry::KeyEntry;
use super::message::{ResponseClassification, SMessage, Section};
use super::nsec::{self, WildcardCheck};
use super::nsec3::{Nsec3Proof, smallest_key_bits};
use super::rrset::RRset;
use super::status::{Justification, SecurityStatus, Verdict};
use super::trust_anchor::{TrustAnchor, TrustAnchorSource, TrustAnchorStore};
use super::val_utils::{
    classify, has_signed_nsecs, nsec_proves_no_ds, rrset_wildcard, verify_dnskeys_with_anchor,
    verify_new_dnskeys,
};
use super::verifier::{SignatureVerifier, current_time};
use crate::config::ValidatorConfig;
use crate::dns::{
    DNSPacket,
    constants::{DNSRcode, VALIDATION_REASON_QCLASS},
    edns::EdnsOpt,
    enums::{DNSResourceClass, DNSResourceType},
    name::Name,
    rdata::DNSResourceData,
    resource::DNSResource,
};
use crate::error::{ConfigError, TransportError};
use crate::transport::DnsTransport;

/// A response after validation, with the verdict that shaped it
#[derive(Debug, Clone)]
pub struct ValidatedResponse {
    pub packet: DNSPacket,
    pub status: SecurityStatus,
    pub justification: Option<Justification>,
}

/// DNSSEC validating front for a transport resolver.
pub struct ValidatingResolver<T> {
    transport: T,
    anchors: Arc<TrustAnchorStore>,
    config: Arc<ValidatorConfig>,
    verifier: SignatureVerifier,
    fixed_time: Option<u32>,
}

impl<T: DnsTransport> ValidatingResolver<T> {
    /// A resolver with an empty trust anchor store. Until anchors are
    /// loaded every answer is insecure.
    pub fn new(transport: T, config: ValidatorConfig) -> Self {
        let config = Arc::new(config);
        Self {
            transport,
            anchors: Arc::new(TrustAnchorStore::new()),
            verifier: SignatureVerifier::new(config.clone()),
            config,
            fixed_time: None,
        }
    }

    /// Validate `config` and load the anchors it names
    pub fn from_config(transport: T, config: ValidatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolver = Self::new(transport, config);

        let mut sources = Vec::new();
        if resolver.config.use_root_anchor_defaults {
            sources.push(TrustAnchorSource::RootDefaults);
        }
        if let Some(path) = &resolver.config.trust_anchor_file {
            sources.push(TrustAnchorSource::File(path.clone()));
        }
        for source in &sources {
            resolver.load_trust_anchors(source)?;
        }
        Ok(resolver)
    }

    /// Share an existing anchor store instead of the resolver's own
    pub fn with_trust_anchors(mut self, anchors: Arc<TrustAnchorStore>) -> Self {
        self.anchors = anchors;
        self
    }

    /// Judge signatures against `now` instead of the system clock
    pub fn with_fixed_time(mut self, now: u32) -> Self {
        self.fixed_time = Some(now);
        self
    }

    pub fn trust_anchors(&self) -> &Arc<TrustAnchorStore> {
        &self.anchors
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Merge the anchors from `source` into the store
    pub fn load_trust_anchors(&self, source: &TrustAnchorSource) -> Result<usize, ConfigError> {
        let rrsets = source.load()?;
        let stored = self.anchors.store_all(&rrsets)?;
        debug!("Stored {} trust anchor RRsets from {}", stored, source);
        Ok(stored)
    }

    /// Replace the whole store with the anchors of `sources`. Every source
    /// is parsed first; on any error the store keeps its old content.
    pub fn reload_trust_anchors(&self, sources: &[TrustAnchorSource]) -> Result<(), ConfigError> {
        let mut rrsets = Vec::new();
        for source in sources {
            rrsets.extend(source.load()?);
        }
        self.anchors.replace_all(&rrsets)?;
        info!(
            "Reloaded trust anchors: {} RRsets from {} sources",
            rrsets.len(),
            sources.len()
        );
        Ok(())
    }

    /// Resolve `query` and return the validated response. Transport errors
    /// of this query come back unchanged.
    pub async fn send(&self, query: DNSPacket) -> Result<DNSPacket, TransportError> {
        if query.header.cd {
            debug!("Query {} has checking disabled, not validating", query.header.id);
            let mut response = self.transport.send(query).await?;
            response.header.ad = false;
            return Ok(response);
        }

        let response = self.transport.send(shape_query(&query)).await?;
        Ok(self.validate_response(&query, response).await.packet)
    }

    /// Validate a response the caller already holds for `query`
    pub async fn validate_response(&self, query: &DNSPacket, response: DNSPacket) -> ValidatedResponse {
        let now = self.fixed_time.unwrap_or_else(current_time);
        let msg = SMessage::from_packet(&response);
        let mut session = ValidationSession::new(self, msg.qclass(), now);
        let verdict = session.validate(&msg).await;
        self.finalize(query, response, verdict)
    }

    fn finalize(&self, query: &DNSPacket, mut response: DNSPacket, verdict: Verdict) -> ValidatedResponse {
        let Verdict {
            status,
            justification,
        } = verdict;
        let question = query
            .question()
            .map(|q| q.to_string())
            .unwrap_or_default();

        match status {
            SecurityStatus::Secure => {
                debug!("Response for {} is {}", question, status);
                response.header.ad = true;
            }
            SecurityStatus::Bogus => {
                warn!(
                    "Response for {} is {}: {}",
                    question,
                    status,
                    justification.as_ref().map(|j| j.to_string()).unwrap_or_default()
                );
                response.header.ad = false;
                response.header.rcode = DNSRcode::SERVFAIL;
                response.answers.clear();
                response.authorities.clear();
                response.resources.clear();
            }
            _ => {
                debug!("Response for {} is {}", question, status);
                response.header.ad = false;
            }
        }
        response.header.cd = query.header.cd;

        let wants_dnssec = query.edns.as_ref().is_some_and(EdnsOpt::do_flag);
        if !wants_dnssec {
            strip_dnssec_records(&mut response, query.question().map(|q| q.qtype));
        }
        if query.edns.is_none() {
            response.edns = None;
        }

        if let Some(justification) = justification.as_ref().filter(|_| !status.is_secure()) {
            let text = justification.to_string();
            if self.config.add_reason_to_response {
                response.resources.push(reason_record(&text));
            }
            if query.edns.is_some() {
                response
                    .edns
                    .get_or_insert_with(EdnsOpt::new)
                    .add_extended_error(justification.ede().code(), &text);
            }
        }

        ValidatedResponse {
            packet: response,
            status,
            justification,
        }
    }
}

/// The upstream copy of a query: DNSSEC records requested and checking
/// disabled, so even bogus data comes back to be judged here.
fn shape_query(query: &DNSPacket) -> DNSPacket {
    let mut upstream = query.clone();
    upstream.header.cd = true;
    upstream
        .edns
        .get_or_insert_with(EdnsOpt::new)
        .set_do_flag(true);
    upstream
}

/// Diagnostic TXT record at the root carrying the validation reason
fn reason_record(text: &str) -> DNSResource {
    let chunks = text.as_bytes().chunks(255).map(<[u8]>::to_vec).collect();
    DNSResource::new(
        Name::root(),
        DNSResourceClass::from(VALIDATION_REASON_QCLASS),
        0,
        DNSResourceData::TXT(chunks),
    )
}

/// Drop DNSSEC records a caller without the DO bit did not ask for
fn strip_dnssec_records(response: &mut DNSPacket, qtype: Option<DNSResourceType>) {
    let keep = |record: &DNSResource| {
        Some(record.rtype) == qtype
            || !matches!(
                record.rtype,
                DNSResourceType::RRSIG | DNSResourceType::NSEC | DNSResourceType::NSEC3
            )
    };
    response.answers.retain(keep);
    response.authorities.retain(keep);
    response.resources.retain(keep);
}

/// What a DS lookup during priming established
enum DsOutcome {
    /// Verified DS RRset: the child is signed
    Delegated(RRset),
    /// The name is no zone cut; keep the current keys
    NoCut,
    /// Proven unsigned delegation
    Insecure(Justification),
    Bogus(Justification),
}

fn reason_of(verdict: Verdict, fallback: DnsSecError) -> Justification {
    verdict.justification.unwrap_or_else(|| fallback.into())
}

/// NSEC and NSEC3 RRsets of an authority section, signatures verified
struct Denial<'m> {
    nsecs: Vec<&'m RRset>,
    nsec3s: Vec<&'m RRset>,
}

/// State of one top-level validation: primed key entries, by zone and by
/// the name they were primed for.
struct ValidationSession<'r, T> {
    resolver: &'r ValidatingResolver<T>,
    class: DNSResourceClass,
    now: u32,
    zones: FxHashMap<Name, KeyEntry>,
    resolved: FxHashMap<Name, KeyEntry>,
}

impl<'r, T: DnsTransport> ValidationSession<'r, T> {
    fn new(resolver: &'r ValidatingResolver<T>, class: DNSResourceClass, now: u32) -> Self {
        Self {
            resolver,
            class,
            now,
            zones: FxHashMap::default(),
            resolved: FxHashMap::default(),
        }
    }

    fn config(&self) -> &ValidatorConfig {
        &self.resolver.config
    }

    async fn validate(&mut self, msg: &SMessage) -> Verdict {
        use ResponseClassification as C;

        let classification = classify(msg);
        let Some(question) = msg.question.clone() else {
            return Verdict::bogus(DnsSecError::UnknownResponse);
        };
        debug!("Response for {} classified as {}", question, classification);

        match classification {
            C::Error => {
                return Verdict::indeterminate(DnsSecError::ErrorRcode(DNSRcode::name(msg.rcode())));
            }
            C::Unknown => return Verdict::bogus(DnsSecError::UnknownResponse),
            _ => {}
        }
        if self.resolver.anchors.is_empty() {
            return Verdict::insecure(DnsSecError::NoTrustAnchor(question.name.to_string()));
        }

        self.prime_all(priming_targets(msg, &question.name)).await;

        let qname = &question.name;
        let qtype = question.qtype;
        match classification {
            C::Positive => match msg.find_rrset(Section::Answer, qname, qtype) {
                Some(rrset) => self.check_answer(msg, rrset, qname),
                None => Verdict::bogus(DnsSecError::UnknownResponse),
            },
            C::Cname | C::CnameNodata | C::CnameNxdomain => {
                self.validate_alias_chain(msg, qname, qtype, classification)
            }
            C::Nodata | C::NodataEmptyNonterminal => self.validate_nodata(msg, qname, qtype),
            C::Nxdomain => self.validate_nxdomain(msg, qname),
            C::Referral => self.validate_referral(msg, qname),
            C::Any => self.validate_any(msg),
            C::Error | C::Unknown => Verdict::bogus(DnsSecError::UnknownResponse),
        }
    }

    // ---- key priming ----

    /// Prime keys for every target, walks for distinct targets running
    /// concurrently, and merge what they found into the session.
    async fn prime_all(&mut self, targets: Vec<Name>) {
        let mut seen = FxHashSet::default();
        let pending: Vec<Name> = targets
            .into_iter()
            .filter(|t| !self.resolved.contains_key(t) && seen.insert(t.clone()))
            .collect();
        if pending.is_empty() {
            return;
        }
        trace!("Priming keys for {} names", pending.len());

        let this: &Self = self;
        let results = join_all(pending.iter().map(move |target| this.prime(target))).await;

        for (target, (entry, discovered)) in pending.into_iter().zip(results) {
            for found in discovered {
                self.zones.entry(found.name().clone()).or_insert(found);
            }
            debug!("Key entry for {}: {}", target, entry);
            self.resolved.insert(target, entry);
        }
    }

    /// Walk from the closest trust anchor down to `target` one label at a
    /// time. Returns the entry responsible for `target` and every entry
    /// established on the way.
    async fn prime(&self, target: &Name) -> (KeyEntry, Vec<KeyEntry>) {
        let Some(anchor) = self.resolver.anchors.find(target, self.class) else {
            let entry = KeyEntry::null(
                target.clone(),
                self.class,
                DnsSecError::NoTrustAnchor(target.to_string()),
            );
            return (entry, Vec::new());
        };

        let mut discovered = Vec::new();
        let mut current = match self.cached_ancestor(target, &anchor.name) {
            Some(entry) => entry.clone(),
            None => {
                let entry = self.prime_anchor(&anchor).await;
                discovered.push(entry.clone());
                entry
            }
        };

        let mut depth = current.name().label_count();
        while depth < target.label_count() {
            let Some(keys) = current.keys() else {
                break;
            };
            let next = target.trim_to(depth + 1);
            let outcome = self.find_ds(&next, keys).await;
            match outcome {
                DsOutcome::Delegated(ds) => {
                    let entry = self.fetch_dnskeys(&next, &ds).await;
                    discovered.push(entry.clone());
                    current = entry;
                }
                DsOutcome::NoCut => trace!("{} is no zone cut", next),
                DsOutcome::Insecure(reason) => {
                    debug!("Delegation to {} is insecure: {}", next, reason);
                    current = KeyEntry::null(next, self.class, reason);
                    discovered.push(current.clone());
                }
                DsOutcome::Bogus(reason) => {
                    debug!("DS of {} is bogus: {}", next, reason);
                    current = KeyEntry::bad(next, self.class, reason);
                    discovered.push(current.clone());
                }
            }
            depth += 1;
        }
        (current, discovered)
    }

    /// Deepest entry already in the session between `anchor` and `target`
    fn cached_ancestor(&self, target: &Name, anchor: &Name) -> Option<&KeyEntry> {
        let mut name = Some(target.clone());
        while let Some(candidate) = name {
            if !candidate.is_subdomain_of(anchor) {
                break;
            }
            if let Some(entry) = self.zones.get(&candidate) {
                return Some(entry);
            }
            name = candidate.parent();
        }
        None
    }

    async fn subquery(&self, name: &Name, qtype: DNSResourceType) -> Result<SMessage, Justification> {
        let mut query = DNSPacket::query(name.clone(), qtype, self.class);
        query.header.cd = true;
        trace!("Sub-query {} {}", name, qtype);
        match self.resolver.transport.send(query).await {
            Ok(response) => Ok(SMessage::from_packet(&response)),
            Err(err) => {
                warn!("Sub-query {} {} failed: {}", name, qtype, err);
                Err(DnsSecError::SubqueryFailed {
                    query: format!("{} {}", name, qtype),
                    detail: err.to_string(),
                }
                .into())
            }
        }
    }

    fn dnskey_rrset(&self, msg: &SMessage, zone: &Name) -> Result<RRset, KeyEntry> {
        let rcode = msg.rcode();
        if rcode != DNSRcode::NOERROR {
            return Err(KeyEntry::bad(
                zone.clone(),
                self.class,
                DnsSecError::DnskeyNoKey {
                    zone: zone.to_string(),
                    rcode: DNSRcode::name(rcode),
                },
            ));
        }
        msg.find_rrset(Section::Answer, zone, DNSResourceType::DNSKEY)
            .cloned()
            .ok_or_else(|| {
                KeyEntry::bad(zone.clone(), self.class, DnsSecError::DnskeyNoRrset(zone.to_string()))
            })
    }

    async fn prime_anchor(&self, anchor: &TrustAnchor) -> KeyEntry {
        let zone = &anchor.name;
        let msg = match self.subquery(zone, DNSResourceType::DNSKEY).await {
            Ok(msg) => msg,
            Err(reason) => return KeyEntry::bad(zone.clone(), self.class, reason),
        };
        let dnskeys = match self.dnskey_rrset(&msg, zone) {
            Ok(dnskeys) => dnskeys,
            Err(entry) => return entry,
        };

        let config = self.config();
        let verifier = &self.resolver.verifier;
        if let Some(anchor_keys) = &anchor.dnskey {
            let entry = verify_dnskeys_with_anchor(&dnskeys, anchor_keys, config, verifier, self.now);
            if entry.is_good() || anchor.ds.is_none() {
                return entry;
            }
        }
        match &anchor.ds {
            Some(ds) => verify_new_dnskeys(&dnskeys, ds, config, verifier, self.now),
            None => KeyEntry::bad(zone.clone(), self.class, DnsSecError::NoTrustAnchor(zone.to_string())),
        }
    }

    async fn fetch_dnskeys(&self, zone: &Name, ds: &RRset) -> KeyEntry {
        let msg = match self.subquery(zone, DNSResourceType::DNSKEY).await {
            Ok(msg) => msg,
            Err(reason) => return KeyEntry::bad(zone.clone(), self.class, reason),
        };
        match self.dnskey_rrset(&msg, zone) {
            Ok(dnskeys) => {
                verify_new_dnskeys(&dnskeys, ds, self.config(), &self.resolver.verifier, self.now)
            }
            Err(entry) => entry,
        }
    }

    async fn find_ds(&self, name: &Name, keys: &RRset) -> DsOutcome {
        match self.subquery(name, DNSResourceType::DS).await {
            Ok(msg) => self.evaluate_ds(&msg, name, keys),
            Err(reason) => DsOutcome::Bogus(reason),
        }
    }

    fn evaluate_ds(&self, msg: &SMessage, name: &Name, keys: &RRset) -> DsOutcome {
        use ResponseClassification as C;
        let unexpected = |rcode: u8| {
            DsOutcome::Bogus(
                DnsSecError::DsUnexpected {
                    zone: name.to_string(),
                    rcode: DNSRcode::name(rcode),
                }
                .into(),
            )
        };

        match classify(msg) {
            C::Positive => {
                let Some(ds) = msg.find_rrset(Section::Answer, name, DNSResourceType::DS) else {
                    return unexpected(msg.rcode());
                };
                let verdict = self.resolver.verifier.verify(ds, keys, self.now);
                if verdict.is_secure() {
                    trace!("DS RRset of {} verified", name);
                    DsOutcome::Delegated(ds.clone())
                } else {
                    DsOutcome::Bogus(reason_of(verdict, DnsSecError::DsNoProof(name.to_string())))
                }
            }
            C::Nodata | C::NodataEmptyNonterminal => self.evaluate_no_ds(msg, name, keys, false),
            C::Nxdomain => self.evaluate_no_ds(msg, name, keys, true),
            // an alias cannot sit at a delegation point
            C::Cname | C::CnameNodata | C::CnameNxdomain => {
                let Some(alias) = msg.find_rrset(Section::Answer, name, DNSResourceType::CNAME) else {
                    return unexpected(msg.rcode());
                };
                let verdict = self.resolver.verifier.verify(alias, keys, self.now);
                if verdict.is_secure() {
                    DsOutcome::NoCut
                } else {
                    DsOutcome::Bogus(reason_of(verdict, DnsSecError::DsNoProof(name.to_string())))
                }
            }
            _ => unexpected(msg.rcode()),
        }
    }

    fn evaluate_no_ds(&self, msg: &SMessage, name: &Name, keys: &RRset, nxdomain: bool) -> DsOutcome {
        let no_proof = || DsOutcome::Bogus(DnsSecError::DsNoProof(name.to_string()).into());

        let mut nsecs = Vec::new();
        let mut nsec3s = Vec::new();
        for rrset in msg.authority() {
            let bucket = match rrset.rtype() {
                DNSResourceType::NSEC => &mut nsecs,
                DNSResourceType::NSEC3 => &mut nsec3s,
                _ => continue,
            };
            let verdict = self.resolver.verifier.verify(rrset, keys, self.now);
            if !verdict.is_secure() {
                return DsOutcome::Bogus(reason_of(verdict, DnsSecError::DsNoProof(name.to_string())));
            }
            bucket.push(rrset);
        }

        if !nsecs.is_empty() {
            if nxdomain {
                return if nsec::proves_name_error(&nsecs, name) {
                    DsOutcome::NoCut
                } else {
                    no_proof()
                };
            }
            let exact = nsecs
                .iter()
                .filter(|rrset| rrset.name() == name)
                .find_map(|rrset| rrset.records().iter().find_map(|r| r.as_nsec()));
            if let Some(data) = exact {
                let verdict = nsec_proves_no_ds(data, name);
                return match verdict.status {
                    SecurityStatus::Secure => {
                        DsOutcome::Insecure(DnsSecError::InsecureDelegationNsec(name.to_string()).into())
                    }
                    SecurityStatus::Indeterminate => DsOutcome::NoCut,
                    _ => DsOutcome::Bogus(reason_of(verdict, DnsSecError::DsBogusProof(name.to_string()))),
                };
            }
            if nsec::proves_nodata(&nsecs, name, DNSResourceType::DS) {
                return DsOutcome::NoCut;
            }
            return no_proof();
        }

        let Some(proof) = Nsec3Proof::new(&nsec3s, keys.name()) else {
            return no_proof();
        };
        let limit = self.config().max_nsec3_iterations(smallest_key_bits(keys));
        if let Some(ignored) = proof.check_iterations(limit) {
            return DsOutcome::Insecure(reason_of(ignored, DnsSecError::DsNoProof(name.to_string())));
        }

        let verdict = if nxdomain {
            proof.prove_name_error(name)
        } else {
            proof.prove_no_ds(name)
        };
        match verdict.status {
            SecurityStatus::Secure if nxdomain => DsOutcome::NoCut,
            SecurityStatus::Secure => {
                DsOutcome::Insecure(DnsSecError::InsecureDelegationNsec3(name.to_string()).into())
            }
            SecurityStatus::Indeterminate => DsOutcome::NoCut,
            SecurityStatus::Insecure => {
                DsOutcome::Insecure(reason_of(verdict, DnsSecError::DsNoProof(name.to_string())))
            }
            _ => DsOutcome::Bogus(reason_of(verdict, DnsSecError::DsNoProof(name.to_string()))),
        }
    }

    // ---- response validation ----

    /// Entry that must vouch for `rrset`: the one primed for its signer, or
    /// for its owner when it carries no signature
    fn entry_for(&self, rrset: &RRset) -> Option<&KeyEntry> {
        let target = rrset.signer_name().unwrap_or(rrset.name());
        self.resolved.get(target)
    }

    fn check_rrset(&self, rrset: &RRset) -> Verdict {
        match self.entry_for(rrset) {
            Some(KeyEntry::Good { keys, .. }) => self.resolver.verifier.verify(rrset, keys, self.now),
            Some(entry) => entry.to_verdict().wrap(format!("keys for {}", rrset)),
            None => Verdict::bogus(DnsSecError::DnskeyNoRrset(rrset.name().to_string())),
        }
    }

    /// Verify an answer RRset for `name`, including the proof that a
    /// wildcard expansion was legitimate
    fn check_answer(&self, msg: &SMessage, rrset: &RRset, name: &Name) -> Verdict {
        let verdict = self.check_rrset(rrset);
        if !verdict.is_secure() {
            return verdict;
        }
        match rrset_wildcard(rrset) {
            Ok(None) => verdict,
            Ok(Some(source)) => {
                trace!("{} expanded from wildcard below {}", rrset, source);
                self.check_wildcard_proof(msg, name, &source)
            }
            Err(reason) => Verdict::bogus(reason).wrap(rrset.to_string()),
        }
    }

    fn check_wildcard_proof(&self, msg: &SMessage, qname: &Name, source: &Name) -> Verdict {
        let denial = match self.verified_denial(msg) {
            Ok(denial) => denial,
            Err(verdict) => return verdict,
        };

        if !denial.nsecs.is_empty() {
            return match nsec::check_wildcard_expansion(&denial.nsecs, qname, source) {
                WildcardCheck::Proven => Verdict::secure(),
                WildcardCheck::TooBroad => Verdict::bogus(DnsSecError::WildcardTooBroad(qname.to_string())),
                WildcardCheck::Unproven => {
                    Verdict::bogus(DnsSecError::WildcardUnproven(qname.to_string()))
                }
            };
        }
        match self.nsec3_proof(&denial.nsec3s) {
            Ok(proof) => proof.prove_wildcard(qname, source),
            Err(verdict) if verdict.is_bogus() => {
                Verdict::bogus(DnsSecError::WildcardUnproven(qname.to_string()))
            }
            Err(verdict) => verdict,
        }
    }

    /// Verify every NSEC and NSEC3 RRset of the authority section
    fn verified_denial<'m>(&self, msg: &'m SMessage) -> Result<Denial<'m>, Verdict> {
        let mut denial = Denial {
            nsecs: Vec::new(),
            nsec3s: Vec::new(),
        };
        for rrset in msg.authority() {
            let bucket = match rrset.rtype() {
                DNSResourceType::NSEC => &mut denial.nsecs,
                DNSResourceType::NSEC3 => &mut denial.nsec3s,
                _ => continue,
            };
            let verdict = self.check_rrset(rrset);
            if !verdict.is_secure() {
                return Err(verdict);
            }
            bucket.push(rrset);
        }
        Ok(denial)
    }

    /// Usable NSEC3 proof of the signing zone, or the verdict replacing it
    /// when there is none or its iteration count is over the ceiling
    fn nsec3_proof<'m>(&self, nsec3s: &[&'m RRset]) -> Result<Nsec3Proof<'m>, Verdict> {
        let Some(zone) = nsec3s.first().and_then(|rrset| rrset.signer_name()) else {
            return Err(Verdict::bogus(DnsSecError::NsecMissing));
        };
        let Some(proof) = Nsec3Proof::new(nsec3s, zone) else {
            return Err(Verdict::bogus(DnsSecError::NsecMissing).wrap("no usable NSEC3"));
        };
        let key_bits = self
            .resolved
            .get(zone)
            .and_then(KeyEntry::keys)
            .map(smallest_key_bits)
            .unwrap_or(0);
        match proof.check_iterations(self.config().max_nsec3_iterations(key_bits)) {
            Some(ignored) => Err(ignored),
            None => Ok(proof),
        }
    }

    /// Status for a negative answer without signed denial: insecure when
    /// the zone is, else the precise failure
    fn missing_denial(&self, msg: &SMessage, qname: &Name) -> Verdict {
        for rrset in msg.authority().iter().filter(|r| {
            matches!(r.rtype(), DNSResourceType::NSEC | DNSResourceType::NSEC3)
        }) {
            let verdict = self.check_rrset(rrset);
            if !verdict.is_secure() {
                return verdict;
            }
        }

        let zone_verdict = match msg.rrsets_of_type(Section::Authority, DNSResourceType::SOA).next() {
            Some(soa) => self.check_rrset(soa),
            None => match self.resolved.get(qname) {
                Some(entry) if !entry.is_good() => entry.to_verdict(),
                _ => Verdict::secure(),
            },
        };
        match zone_verdict.status {
            SecurityStatus::Secure => Verdict::bogus(DnsSecError::NsecMissing).wrap(qname.to_string()),
            _ => zone_verdict,
        }
    }

    /// Verified SOA of a negative answer, and the zone it names. Denial
    /// records must come from that same zone.
    fn check_negative_zone(&self, msg: &SMessage, denial: &Denial<'_>, qname: &Name) -> Verdict {
        let Some(soa) = msg.rrsets_of_type(Section::Authority, DNSResourceType::SOA).next() else {
            return Verdict::secure();
        };
        let verdict = self.check_rrset(soa);
        if !verdict.is_secure() {
            return verdict;
        }
        let foreign = denial
            .nsecs
            .iter()
            .chain(&denial.nsec3s)
            .any(|rrset| rrset.signer_name() != Some(soa.name()));
        if foreign {
            return Verdict::bogus(DnsSecError::NodataProofFailed(qname.to_string()))
                .wrap(format!("denial not signed by {}", soa.name()));
        }
        verdict
    }

    fn validate_nodata(&self, msg: &SMessage, qname: &Name, qtype: DNSResourceType) -> Verdict {
        if !has_signed_nsecs(msg) {
            return self.missing_denial(msg, qname);
        }
        let denial = match self.verified_denial(msg) {
            Ok(denial) => denial,
            Err(verdict) => return verdict,
        };
        let zone = self.check_negative_zone(msg, &denial, qname);
        if !zone.is_secure() {
            return zone;
        }

        let proof = if !denial.nsecs.is_empty() {
            if nsec::proves_nodata(&denial.nsecs, qname, qtype) {
                Verdict::secure()
            } else {
                Verdict::bogus(DnsSecError::NodataProofFailed(qname.to_string()))
            }
        } else {
            match self.nsec3_proof(&denial.nsec3s) {
                Ok(proof) => proof.prove_nodata(qname, qtype),
                Err(verdict) => verdict,
            }
        };
        debug!("NODATA proof for {} {}: {}", qname, qtype, proof.status);
        proof
    }

    fn validate_nxdomain(&self, msg: &SMessage, qname: &Name) -> Verdict {
        if !has_signed_nsecs(msg) {
            return self.missing_denial(msg, qname);
        }
        let denial = match self.verified_denial(msg) {
            Ok(denial) => denial,
            Err(verdict) => return verdict,
        };
        let zone = self.check_negative_zone(msg, &denial, qname);
        if !zone.is_secure() {
            return zone;
        }

        let proof = if !denial.nsecs.is_empty() {
            let fail = || Verdict::bogus(DnsSecError::NxdomainProofFailed(qname.to_string()));
            if !nsec::proves_name_error(&denial.nsecs, qname) {
                fail().wrap("name not covered")
            } else {
                match nsec::wildcard_closest_encloser(&denial.nsecs, qname) {
                    Some(encloser) if encloser == *qname => fail().wrap("name exists"),
                    Some(encloser) if nsec::proves_no_wildcard(&denial.nsecs, &encloser) => {
                        Verdict::secure()
                    }
                    _ => fail().wrap("wildcard not denied"),
                }
            }
        } else {
            match self.nsec3_proof(&denial.nsec3s) {
                Ok(proof) => proof.prove_name_error(qname),
                Err(verdict) => verdict,
            }
        };
        debug!("NXDOMAIN proof for {}: {}", qname, proof.status);
        proof
    }

    /// Follow CNAME and DNAME links from `qname`, verifying each link before
    /// trusting where it points
    fn validate_alias_chain(
        &self,
        msg: &SMessage,
        qname: &Name,
        qtype: DNSResourceType,
        classification: ResponseClassification,
    ) -> Verdict {
        let mut verdicts = Vec::new();
        let mut seen = FxHashSet::default();
        let mut current = qname.clone();

        for _ in 0..=self.config().max_cname_chain {
            if !seen.insert(current.clone()) {
                return Verdict::bogus(DnsSecError::CnameLoop(current.to_string()));
            }

            if let Some(rrset) = msg.find_rrset(Section::Answer, &current, qtype) {
                verdicts.push(self.check_answer(msg, rrset, &current));
                return Verdict::combine(verdicts);
            }

            if let Some(dname) = msg.answer().iter().find(|rrset| {
                rrset.rtype() == DNSResourceType::DNAME && current.is_strict_subdomain_of(rrset.name())
            }) {
                let verdict = self.check_rrset(dname);
                if !verdict.is_secure() {
                    verdicts.push(verdict.wrap(format!("DNAME {}", dname.name())));
                    return Verdict::combine(verdicts);
                }
                let synthesized = dname
                    .records()
                    .first()
                    .and_then(|r| r.alias_target())
                    .and_then(|target| current.replace_suffix(dname.name(), target).ok());
                let Some(synthesized) = synthesized else {
                    return Verdict::bogus(DnsSecError::ChainBroken(current.to_string()));
                };
                // the accompanying CNAME is unsigned and only has to agree
                let cname_target = msg
                    .find_rrset(Section::Answer, &current, DNSResourceType::CNAME)
                    .and_then(|cname| cname.records().first())
                    .and_then(|r| r.alias_target());
                if cname_target.is_some_and(|target| *target != synthesized) {
                    return Verdict::bogus(DnsSecError::ChainBroken(current.to_string()))
                        .wrap("CNAME disagrees with DNAME");
                }
                trace!("DNAME {} maps {} to {}", dname.name(), current, synthesized);
                verdicts.push(verdict);
                current = synthesized;
                continue;
            }

            if let Some(cname) = msg.find_rrset(Section::Answer, &current, DNSResourceType::CNAME) {
                let verdict = self.check_answer(msg, cname, &current);
                if !verdict.is_secure() {
                    verdicts.push(verdict.wrap(format!("CNAME chain at {}", current)));
                    return Verdict::combine(verdicts);
                }
                if cname.len() != 1 {
                    return Verdict::bogus(DnsSecError::ChainBroken(current.to_string()));
                }
                let Some(target) = cname.records().first().and_then(|r| r.alias_target()) else {
                    return Verdict::bogus(DnsSecError::ChainBroken(current.to_string()));
                };
                verdicts.push(verdict);
                current = target.clone();
                continue;
            }

            let tail = match classification {
                ResponseClassification::CnameNxdomain => self.validate_nxdomain(msg, &current),
                ResponseClassification::CnameNodata => self.validate_nodata(msg, &current, qtype),
                _ => Verdict::bogus(DnsSecError::ChainBroken(current.to_string())),
            };
            verdicts.push(tail);
            return Verdict::combine(verdicts);
        }

        Verdict::bogus(DnsSecError::CnameLoop(current.to_string())).wrap("alias chain too long")
    }

    /// A delegation: a verified DS, or a proof that there is none
    fn validate_referral(&self, msg: &SMessage, qname: &Name) -> Verdict {
        let fail = |cut: &Name| Verdict::bogus(DnsSecError::ReferralProofFailed(cut.to_string()));

        let Some(ns) = msg.rrsets_of_type(Section::Authority, DNSResourceType::NS).next() else {
            return fail(qname);
        };
        let cut = ns.name();
        let ds = msg.find_rrset(Section::Authority, cut, DNSResourceType::DS);
        let soa = msg.find_rrset(Section::Authority, cut, DNSResourceType::SOA);
        if ds.is_some() && soa.is_some() {
            return Verdict::bogus(DnsSecError::ReferralContradiction(cut.to_string()));
        }
        if let Some(ds) = ds {
            return self.check_rrset(ds);
        }

        if !has_signed_nsecs(msg) {
            let verdict = self.missing_denial(msg, cut);
            return if verdict.is_bogus() {
                fail(cut).wrap(reason_of(verdict, DnsSecError::NsecMissing).to_string())
            } else {
                verdict
            };
        }
        let denial = match self.verified_denial(msg) {
            Ok(denial) => denial,
            Err(verdict) => return verdict,
        };

        if !denial.nsecs.is_empty() {
            let exact = denial
                .nsecs
                .iter()
                .filter(|rrset| rrset.name() == cut)
                .find_map(|rrset| rrset.records().iter().find_map(|r| r.as_nsec()));
            return match exact.map(|data| nsec_proves_no_ds(data, cut)) {
                Some(verdict) if verdict.is_secure() => {
                    Verdict::insecure(DnsSecError::InsecureDelegationNsec(cut.to_string()))
                }
                _ => fail(cut),
            };
        }
        let proof = match self.nsec3_proof(&denial.nsec3s) {
            Ok(proof) => proof,
            Err(verdict) => return verdict,
        };
        let verdict = proof.prove_no_ds(cut);
        match verdict.status {
            SecurityStatus::Secure => {
                Verdict::insecure(DnsSecError::InsecureDelegationNsec3(cut.to_string()))
            }
            SecurityStatus::Insecure => verdict,
            _ => fail(cut).wrap(reason_of(verdict, DnsSecError::DsNoProof(cut.to_string())).to_string()),
        }
    }

    /// Every RRset of an ANY answer stands on its own; the weakest wins
    fn validate_any(&self, msg: &SMessage) -> Verdict {
        Verdict::combine(
            msg.answer()
                .iter()
                .map(|rrset| self.check_answer(msg, rrset, rrset.name())),
        )
    }
}

/// Names whose keys the validation of `msg` will need: the signer of every
/// signed RRset, and the owner of every unsigned one.
fn priming_targets(msg: &SMessage, qname: &Name) -> Vec<Name> {
    let mut targets: Vec<Name> = msg
        .answer()
        .iter()
        .chain(msg.authority().iter().filter(|rrset| {
            matches!(
                rrset.rtype(),
                DNSResourceType::SOA
                    | DNSResourceType::DS
                    | DNSResourceType::NSEC
                    | DNSResourceType::NSEC3
            )
        }))
        .map(|rrset| rrset.signer_name().unwrap_or(rrset.name()).clone())
        .collect();

    let signed = msg
        .answer()
        .iter()
        .chain(msg.authority().iter())
        .any(RRset::is_signed);
    if !signed {
        let referral_cut = msg
            .rrsets_of_type(Section::Authority, DNSResourceType::NS)
            .next()
            .map(|ns| ns.name().clone());
        targets.push(referral_cut.unwrap_or_else(|| qname.clone()));
    }
    targets
}
