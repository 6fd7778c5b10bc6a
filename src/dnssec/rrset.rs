use crate::dns::{
    enums::{DNSResourceClass, DNSResourceType},
    name::Name,
    rdata::RrsigData,
    resource::DNSResource,
};

/// Records sharing owner, type and class, plus the RRSIGs covering them.
///
/// Immutable once built. Validation results live next to it, not inside it,
/// so the same set can be judged by concurrent validations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RRset {
    name: Name,
    rtype: DNSResourceType,
    rclass: DNSResourceClass,
    ttl: u32,
    records: Vec<DNSResource>,
    sigs: Vec<DNSResource>,
}

impl RRset {
    pub fn new(first: DNSResource) -> Self {
        Self {
            name: first.name.clone(),
            rtype: first.rtype,
            rclass: first.rclass,
            ttl: first.ttl,
            records: vec![first],
            sigs: Vec::new(),
        }
    }

    /// Group records into one set; `None` if empty or not all alike.
    pub fn from_records(records: Vec<DNSResource>) -> Option<Self> {
        let mut iter = records.into_iter();
        let mut rrset = RRset::new(iter.next()?);
        for record in iter {
            if !rrset.push_record(record) {
                return None;
            }
        }
        Some(rrset)
    }

    /// Attach RRSIGs; signatures that do not cover this set are dropped.
    pub fn with_sigs<I: IntoIterator<Item = DNSResource>>(mut self, sigs: I) -> Self {
        for sig in sigs {
            self.push_sig(sig);
        }
        self
    }

    /// Same data with every signature removed
    pub fn without_sigs(&self) -> Self {
        Self {
            sigs: Vec::new(),
            ..self.clone()
        }
    }

    pub(crate) fn matches(&self, record: &DNSResource) -> bool {
        record.rtype == self.rtype && record.rclass == self.rclass && record.name == self.name
    }

    pub(crate) fn push_record(&mut self, record: DNSResource) -> bool {
        if !self.matches(&record) {
            return false;
        }
        self.ttl = self.ttl.min(record.ttl);
        if !self.records.iter().any(|r| r.rdata == record.rdata) {
            self.records.push(record);
        }
        true
    }

    pub(crate) fn push_sig(&mut self, sig: DNSResource) -> bool {
        let covers = sig
            .as_rrsig()
            .is_some_and(|rrsig| rrsig.type_covered == self.rtype);
        if !covers || sig.rclass != self.rclass || sig.name != self.name {
            return false;
        }
        if !self.sigs.iter().any(|s| s.rdata == sig.rdata) {
            self.sigs.push(sig);
        }
        true
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn rtype(&self) -> DNSResourceType {
        self.rtype
    }

    pub fn rclass(&self) -> DNSResourceClass {
        self.rclass
    }

    /// Smallest TTL across the records
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn records(&self) -> &[DNSResource] {
        &self.records
    }

    pub fn sigs(&self) -> &[DNSResource] {
        &self.sigs
    }

    pub fn rrsigs(&self) -> impl Iterator<Item = &RrsigData> {
        self.sigs.iter().filter_map(DNSResource::as_rrsig)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_signed(&self) -> bool {
        !self.sigs.is_empty()
    }

    /// Signer of the first signature, which names the zone the set came from
    pub fn signer_name(&self) -> Option<&Name> {
        self.rrsigs().next().map(|sig| &sig.signer_name)
    }

    /// Records followed by their signatures
    pub fn to_records(&self) -> Vec<DNSResource> {
        self.records.iter().chain(self.sigs.iter()).cloned().collect()
    }
}

impl std::fmt::Display for RRset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.name, self.rclass, self.rtype)
    }
}
