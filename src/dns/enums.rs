use std::fmt;
use std::str::FromStr;

use super::ParseError;

/// Record types this crate models. Anything else is carried as `Unknown`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DNSResourceType {
    #[default]
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    DNAME,
    OPT,
    DS,
    RRSIG,
    NSEC,
    DNSKEY,
    NSEC3,
    NSEC3PARAM,
    ANY,
    Unknown(u16),
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceType::A,
            2 => DNSResourceType::NS,
            5 => DNSResourceType::CNAME,
            6 => DNSResourceType::SOA,
            12 => DNSResourceType::PTR,
            15 => DNSResourceType::MX,
            16 => DNSResourceType::TXT,
            28 => DNSResourceType::AAAA,
            33 => DNSResourceType::SRV,
            39 => DNSResourceType::DNAME,
            41 => DNSResourceType::OPT,
            43 => DNSResourceType::DS,
            46 => DNSResourceType::RRSIG,
            47 => DNSResourceType::NSEC,
            48 => DNSResourceType::DNSKEY,
            50 => DNSResourceType::NSEC3,
            51 => DNSResourceType::NSEC3PARAM,
            255 => DNSResourceType::ANY,
            other => DNSResourceType::Unknown(other),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(rtype: DNSResourceType) -> Self {
        match rtype {
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::PTR => 12,
            DNSResourceType::MX => 15,
            DNSResourceType::TXT => 16,
            DNSResourceType::AAAA => 28,
            DNSResourceType::SRV => 33,
            DNSResourceType::DNAME => 39,
            DNSResourceType::OPT => 41,
            DNSResourceType::DS => 43,
            DNSResourceType::RRSIG => 46,
            DNSResourceType::NSEC => 47,
            DNSResourceType::DNSKEY => 48,
            DNSResourceType::NSEC3 => 50,
            DNSResourceType::NSEC3PARAM => 51,
            DNSResourceType::ANY => 255,
            DNSResourceType::Unknown(value) => value,
        }
    }
}

impl DNSResourceType {
    pub fn mnemonic(&self) -> Option<&'static str> {
        let name = match self {
            DNSResourceType::A => "A",
            DNSResourceType::NS => "NS",
            DNSResourceType::CNAME => "CNAME",
            DNSResourceType::SOA => "SOA",
            DNSResourceType::PTR => "PTR",
            DNSResourceType::MX => "MX",
            DNSResourceType::TXT => "TXT",
            DNSResourceType::AAAA => "AAAA",
            DNSResourceType::SRV => "SRV",
            DNSResourceType::DNAME => "DNAME",
            DNSResourceType::OPT => "OPT",
            DNSResourceType::DS => "DS",
            DNSResourceType::RRSIG => "RRSIG",
            DNSResourceType::NSEC => "NSEC",
            DNSResourceType::DNSKEY => "DNSKEY",
            DNSResourceType::NSEC3 => "NSEC3",
            DNSResourceType::NSEC3PARAM => "NSEC3PARAM",
            DNSResourceType::ANY => "ANY",
            DNSResourceType::Unknown(_) => return None,
        };
        Some(name)
    }

    /// DNSSEC record types (RFC 4034, RFC 5155)
    pub fn is_dnssec(&self) -> bool {
        matches!(
            self,
            DNSResourceType::DS
                | DNSResourceType::RRSIG
                | DNSResourceType::NSEC
                | DNSResourceType::DNSKEY
                | DNSResourceType::NSEC3
                | DNSResourceType::NSEC3PARAM
        )
    }
}

impl fmt::Display for DNSResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(name) => f.write_str(name),
            None => write!(f, "TYPE{}", u16::from(*self)),
        }
    }
}

impl FromStr for DNSResourceType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if let Some(number) = upper.strip_prefix("TYPE") {
            return number
                .parse::<u16>()
                .map(DNSResourceType::from)
                .map_err(|_| ParseError::InvalidPresentation(s.to_string()));
        }
        let rtype = match upper.as_str() {
            "A" => DNSResourceType::A,
            "NS" => DNSResourceType::NS,
            "CNAME" => DNSResourceType::CNAME,
            "SOA" => DNSResourceType::SOA,
            "PTR" => DNSResourceType::PTR,
            "MX" => DNSResourceType::MX,
            "TXT" => DNSResourceType::TXT,
            "AAAA" => DNSResourceType::AAAA,
            "SRV" => DNSResourceType::SRV,
            "DNAME" => DNSResourceType::DNAME,
            "OPT" => DNSResourceType::OPT,
            "DS" => DNSResourceType::DS,
            "RRSIG" => DNSResourceType::RRSIG,
            "NSEC" => DNSResourceType::NSEC,
            "DNSKEY" => DNSResourceType::DNSKEY,
            "NSEC3" => DNSResourceType::NSEC3,
            "NSEC3PARAM" => DNSResourceType::NSEC3PARAM,
            "ANY" => DNSResourceType::ANY,
            _ => return Err(ParseError::InvalidPresentation(s.to_string())),
        };
        Ok(rtype)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceClass {
    #[default]
    IN,
    CH,
    HS,
    NONE,
    ANY,
    Unknown(u16),
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            3 => DNSResourceClass::CH,
            4 => DNSResourceClass::HS,
            254 => DNSResourceClass::NONE,
            255 => DNSResourceClass::ANY,
            other => DNSResourceClass::Unknown(other),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(class: DNSResourceClass) -> Self {
        match class {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::NONE => 254,
            DNSResourceClass::ANY => 255,
            DNSResourceClass::Unknown(value) => value,
        }
    }
}

impl fmt::Display for DNSResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSResourceClass::IN => f.write_str("IN"),
            DNSResourceClass::CH => f.write_str("CH"),
            DNSResourceClass::HS => f.write_str("HS"),
            DNSResourceClass::NONE => f.write_str("NONE"),
            DNSResourceClass::ANY => f.write_str("ANY"),
            DNSResourceClass::Unknown(value) => write!(f, "CLASS{}", value),
        }
    }
}

impl FromStr for DNSResourceClass {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if let Some(number) = upper.strip_prefix("CLASS") {
            return number
                .parse::<u16>()
                .map(DNSResourceClass::from)
                .map_err(|_| ParseError::InvalidPresentation(s.to_string()));
        }
        match upper.as_str() {
            "IN" => Ok(DNSResourceClass::IN),
            "CH" => Ok(DNSResourceClass::CH),
            "HS" => Ok(DNSResourceClass::HS),
            "NONE" => Ok(DNSResourceClass::NONE),
            "ANY" => Ok(DNSResourceClass::ANY),
            _ => Err(ParseError::InvalidPresentation(s.to_string())),
        }
    }
}
