use bitstream_io::{BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::{PacketComponent, WireReader},
    enums::{DNSResourceClass, DNSResourceType},
    name::Name,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DNSQuestion {
    pub name: Name,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn new(name: Name, qtype: DNSResourceType, qclass: DNSResourceClass) -> Self {
        Self {
            name,
            qtype,
            qclass,
        }
    }
}

impl std::fmt::Display for DNSQuestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.name, self.qclass, self.qtype)
    }
}

impl PacketComponent for DNSQuestion {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        self.write_name(writer, &self.name)?;
        writer.write_var::<u16>(16, self.qtype.into())?;
        writer.write_var::<u16>(16, self.qclass.into())?;
        Ok(())
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, ParseError> {
        let name = reader
            .read_name()
            .map_err(|_| ParseError::InvalidQuestionSection)?;
        let qtype = reader.read_u16()?.into();
        let qclass = reader.read_u16()?.into();
        Ok(DNSQuestion {
            name,
            qtype,
            qclass,
        })
    }
}
