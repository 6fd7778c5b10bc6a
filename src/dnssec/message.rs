use std::fmt;

use tracing::trace;

use super::rrset::RRset;
use crate::dns::{
    DNSPacket,
    edns::EdnsOpt,
    enums::{DNSResourceClass, DNSResourceType},
    header::DNSHeader,
    name::Name,
    question::DNSQuestion,
    resource::DNSResource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Answer,
    Authority,
    Additional,
}

/// What kind of answer a response is, which decides how it gets proven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseClassification {
    Positive,
    Cname,
    Nodata,
    NodataEmptyNonterminal,
    Nxdomain,
    CnameNodata,
    CnameNxdomain,
    Referral,
    Any,
    Error,
    Unknown,
}

impl fmt::Display for ResponseClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Positive => "POSITIVE",
            Self::Cname => "CNAME",
            Self::Nodata => "NODATA",
            Self::NodataEmptyNonterminal => "NODATA_EMPTY_NONTERMINAL",
            Self::Nxdomain => "NXDOMAIN",
            Self::CnameNodata => "CNAME_NODATA",
            Self::CnameNxdomain => "CNAME_NXDOMAIN",
            Self::Referral => "REFERRAL",
            Self::Any => "ANY",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A response with its sections grouped into RRsets.
#[derive(Debug, Clone, Default)]
pub struct SMessage {
    pub header: DNSHeader,
    pub question: Option<DNSQuestion>,
    answer: Vec<RRset>,
    authority: Vec<RRset>,
    additional: Vec<RRset>,
    pub edns: Option<EdnsOpt>,
}

impl SMessage {
    pub fn from_packet(packet: &DNSPacket) -> Self {
        Self {
            header: packet.header.clone(),
            question: packet.questions.first().cloned(),
            answer: group_rrsets(&packet.answers),
            authority: group_rrsets(&packet.authorities),
            additional: group_rrsets(&packet.resources),
            edns: packet.edns.clone(),
        }
    }

    pub fn section(&self, section: Section) -> &[RRset] {
        match section {
            Section::Answer => &self.answer,
            Section::Authority => &self.authority,
            Section::Additional => &self.additional,
        }
    }

    pub fn answer(&self) -> &[RRset] {
        &self.answer
    }

    pub fn authority(&self) -> &[RRset] {
        &self.authority
    }

    pub fn additional(&self) -> &[RRset] {
        &self.additional
    }

    pub fn rcode(&self) -> u8 {
        self.header.rcode
    }

    pub fn qclass(&self) -> DNSResourceClass {
        self.question
            .as_ref()
            .map(|q| q.qclass)
            .unwrap_or(DNSResourceClass::IN)
    }

    pub fn find_rrset(
        &self,
        section: Section,
        name: &Name,
        rtype: DNSResourceType,
    ) -> Option<&RRset> {
        self.section(section)
            .iter()
            .find(|rrset| rrset.rtype() == rtype && rrset.name() == name)
    }

    pub fn rrsets_of_type(
        &self,
        section: Section,
        rtype: DNSResourceType,
    ) -> impl Iterator<Item = &RRset> {
        self.section(section)
            .iter()
            .filter(move |rrset| rrset.rtype() == rtype)
    }

    /// Flatten back into a packet, signatures following their sets
    pub fn to_packet(&self) -> DNSPacket {
        let flatten = |sets: &[RRset]| sets.iter().flat_map(RRset::to_records).collect();
        DNSPacket {
            header: self.header.clone(),
            questions: self.question.iter().cloned().collect(),
            answers: flatten(&self.answer),
            authorities: flatten(&self.authority),
            resources: flatten(&self.additional),
            edns: self.edns.clone(),
        }
    }
}

/// Group a flat record list into RRsets in order of first appearance and
/// attach each RRSIG to the set it covers, wherever it appears.
pub(crate) fn group_rrsets(records: &[DNSResource]) -> Vec<RRset> {
    let mut sets: Vec<RRset> = Vec::new();
    for record in records.iter().filter(|r| r.rtype != DNSResourceType::RRSIG) {
        match sets.iter_mut().find(|set| set.matches(record)) {
            Some(set) => {
                set.push_record(record.clone());
            }
            None => sets.push(RRset::new(record.clone())),
        }
    }

    for sig in records.iter().filter(|r| r.rtype == DNSResourceType::RRSIG) {
        let attached = sets.iter_mut().any(|set| set.push_sig(sig.clone()));
        if !attached {
            trace!("Dropping RRSIG without covered RRset at {}", sig.name);
        }
    }
    sets
}
