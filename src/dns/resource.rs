use bitstream_io::{BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::{PacketComponent, WireReader},
    enums::{DNSResourceClass, DNSResourceType},
    name::Name,
    rdata::{DNSResourceData, DnsKeyData, DsData, Nsec3Data, NsecData, RrsigData, SoaData},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub name: Name,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: DNSResourceData,
}

impl DNSResource {
    /// Build a record whose type follows from its typed RDATA.
    pub fn new(name: Name, rclass: DNSResourceClass, ttl: u32, rdata: DNSResourceData) -> Self {
        let rtype = rdata.rtype().unwrap_or(DNSResourceType::Unknown(0));
        Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    pub fn with_type(
        name: Name,
        rtype: DNSResourceType,
        rclass: DNSResourceClass,
        ttl: u32,
        rdata: DNSResourceData,
    ) -> Self {
        Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    pub fn as_rrsig(&self) -> Option<&RrsigData> {
        match &self.rdata {
            DNSResourceData::RRSIG(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn as_dnskey(&self) -> Option<&DnsKeyData> {
        match &self.rdata {
            DNSResourceData::DNSKEY(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_ds(&self) -> Option<&DsData> {
        match &self.rdata {
            DNSResourceData::DS(ds) => Some(ds),
            _ => None,
        }
    }

    pub fn as_nsec(&self) -> Option<&NsecData> {
        match &self.rdata {
            DNSResourceData::NSEC(nsec) => Some(nsec),
            _ => None,
        }
    }

    pub fn as_nsec3(&self) -> Option<&Nsec3Data> {
        match &self.rdata {
            DNSResourceData::NSEC3(nsec3) => Some(nsec3),
            _ => None,
        }
    }

    pub fn as_soa(&self) -> Option<&SoaData> {
        match &self.rdata {
            DNSResourceData::SOA(soa) => Some(soa),
            _ => None,
        }
    }

    /// Alias target for CNAME and DNAME records
    pub fn alias_target(&self) -> Option<&Name> {
        match &self.rdata {
            DNSResourceData::CNAME(target) | DNSResourceData::DNAME(target) => Some(target),
            _ => None,
        }
    }
}

impl std::fmt::Display for DNSResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name, self.ttl, self.rclass, self.rtype, self.rdata
        )
    }
}

impl PacketComponent for DNSResource {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        let rdata = self.rdata.to_wire();
        if rdata.len() > u16::MAX as usize {
            return Err(ParseError::InvalidRdata("RDATA longer than 65535 bytes".into()));
        }
        self.write_name(writer, &self.name)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        writer.write_var::<u16>(16, rdata.len() as u16)?;
        writer.write_bytes(&rdata)?;
        Ok(())
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, ParseError> {
        let name = reader.read_name()?;
        let rtype: DNSResourceType = reader.read_u16()?.into();
        let rclass = reader.read_u16()?.into();
        let ttl = reader.read_u32()?;
        let rdlength = reader.read_u16()? as usize;
        let mut window = reader.sub_reader(rdlength)?;
        let rdata = DNSResourceData::decode(rtype, &mut window)?;
        Ok(DNSResource {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        })
    }
}

/// Parse a bare stream of uncompressed resource records, as found in
/// wire-format trust anchor files.
pub fn parse_wire_records(buf: &[u8]) -> Result<Vec<DNSResource>, ParseError> {
    let mut reader = WireReader::new(buf);
    let mut records = Vec::new();
    while !reader.is_empty() {
        records.push(DNSResource::read(&mut reader)?);
    }
    Ok(records)
}
