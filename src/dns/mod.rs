pub mod common;
pub mod constants;
pub mod edns;
pub mod enums;
pub mod header;
pub mod name;
pub mod question;
pub mod rdata;
pub mod resource;

use bitstream_io::{BigEndian, BitWrite, BitWriter};
use common::{PacketComponent, WireReader};
use edns::EdnsOpt;
use enums::{DNSResourceClass, DNSResourceType};
use header::DNSHeader;
use name::Name;
use question::DNSQuestion;
use resource::DNSResource;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
    /// EDNS0 OPT record if present (extracted from additional records)
    pub edns: Option<EdnsOpt>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid DNS header")]
    InvalidHeader,
    #[error("Invalid DNS label")]
    InvalidLabel,
    #[error("DNS name too long")]
    NameTooLong,
    #[error("Name compression loop")]
    CompressionLoop,
    #[error("Unexpected end of data")]
    Truncated,
    #[error("Invalid question section")]
    InvalidQuestionSection,
    #[error("Invalid RDATA: {0}")]
    InvalidRdata(String),
    #[error("Invalid presentation format: {0}")]
    InvalidPresentation(String),
    #[error("Invalid bit stream: {0}")]
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

impl DNSPacket {
    /// A recursive query for one question with EDNS0 and the DO bit set
    pub fn query(name: Name, qtype: DNSResourceType, qclass: DNSResourceClass) -> Self {
        let mut edns = EdnsOpt::new();
        edns.set_do_flag(true);
        DNSPacket {
            header: DNSHeader {
                rd: true,
                qdcount: 1,
                ..Default::default()
            },
            questions: vec![DNSQuestion::new(name, qtype, qclass)],
            edns: Some(edns),
            ..Default::default()
        }
    }

    pub fn question(&self) -> Option<&DNSQuestion> {
        self.questions.first()
    }

    pub fn rcode(&self) -> u8 {
        self.header.rcode
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        let mut reader = WireReader::new(buf);
        let header = DNSHeader::read(&mut reader)?;
        debug!(
            "Parsed DNS header: id={}, qr={}, rcode={}, questions={}",
            header.id, header.qr, header.rcode, header.qdcount
        );

        let mut packet = DNSPacket {
            header,
            ..Default::default()
        };
        for _ in 0..packet.header.qdcount {
            packet.questions.push(DNSQuestion::read(&mut reader)?);
        }
        for _ in 0..packet.header.ancount {
            packet.answers.push(DNSResource::read(&mut reader)?);
        }
        for _ in 0..packet.header.nscount {
            packet.authorities.push(DNSResource::read(&mut reader)?);
        }
        for _ in 0..packet.header.arcount {
            let resource = DNSResource::read(&mut reader)?;
            if resource.rtype == DNSResourceType::OPT && resource.name.is_root() {
                if let rdata::DNSResourceData::Unknown(bytes) = &resource.rdata {
                    let edns =
                        EdnsOpt::parse_from_resource(resource.rclass.into(), resource.ttl, bytes)?;
                    trace!("Parsed {}", edns);
                    packet.edns = Some(edns);
                    continue;
                }
            }
            packet.resources.push(resource);
        }

        Ok(packet)
    }

    /// Serialize without name compression; section counts are recomputed.
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = self.resources.len() as u16 + self.edns.is_some() as u16;
        header.write(&mut writer)?;

        for question in &self.questions {
            question.write(&mut writer)?;
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.resources)
        {
            record.write(&mut writer)?;
        }

        if let Some(edns) = &self.edns {
            let (udp_payload_size, ttl, rdata) = edns.to_resource_format();
            writer.write_var::<u8>(8, 0)?;
            writer.write_var::<u16>(16, DNSResourceType::OPT.into())?;
            writer.write_var::<u16>(16, udp_payload_size)?;
            writer.write_var::<u32>(32, ttl)?;
            writer.write_var::<u16>(16, rdata.len() as u16)?;
            writer.write_bytes(&rdata)?;
        }

        Ok(buf)
    }
}
