use super::{ParseError, constants::DEFAULT_PAYLOAD_SIZE};

const DO_FLAG: u16 = 0x8000;

/// EDNS0 OPT pseudo-record implementation
/// RFC 6891: https://tools.ietf.org/html/rfc6891
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOpt {
    /// UDP payload size that can be handled by the requestor
    pub udp_payload_size: u16,
    /// Extended RCODE (high 8 bits)
    pub extended_rcode: u8,
    /// EDNS version (currently 0)
    pub version: u8,
    /// EDNS flags (16 bits)
    pub flags: u16,
    /// Variable length RDATA containing EDNS options
    pub options: Vec<EdnsOption>,
}

/// EDNS option structure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOption {
    /// Option code (2 bytes)
    pub code: u16,
    /// Option data
    pub data: Vec<u8>,
}

/// EDNS option codes this crate reads or writes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdnsOptionCode {
    /// Name Server Identifier (RFC 5001)
    Nsid,
    /// DNSSEC Algorithm Understood (RFC 6975)
    Dau,
    /// DS Hash Understood (RFC 6975)
    Dhu,
    /// NSEC3 Hash Understood (RFC 6975)
    N3u,
    /// Extended DNS Error (RFC 8914)
    ExtendedError,
    /// Unknown option
    Unknown(u16),
}

impl From<u16> for EdnsOptionCode {
    fn from(value: u16) -> Self {
        match value {
            3 => EdnsOptionCode::Nsid,
            5 => EdnsOptionCode::Dau,
            6 => EdnsOptionCode::Dhu,
            7 => EdnsOptionCode::N3u,
            15 => EdnsOptionCode::ExtendedError,
            other => EdnsOptionCode::Unknown(other),
        }
    }
}

impl From<EdnsOptionCode> for u16 {
    fn from(code: EdnsOptionCode) -> Self {
        match code {
            EdnsOptionCode::Nsid => 3,
            EdnsOptionCode::Dau => 5,
            EdnsOptionCode::Dhu => 6,
            EdnsOptionCode::N3u => 7,
            EdnsOptionCode::ExtendedError => 15,
            EdnsOptionCode::Unknown(other) => other,
        }
    }
}

impl Default for EdnsOpt {
    fn default() -> Self {
        Self::new()
    }
}

impl EdnsOpt {
    /// Create a new EDNS OPT record with default values
    pub fn new() -> Self {
        Self {
            udp_payload_size: DEFAULT_PAYLOAD_SIZE,
            extended_rcode: 0,
            version: 0,
            flags: 0,
            options: Vec::new(),
        }
    }

    /// Check if DNSSEC OK (DO) flag is set
    pub fn do_flag(&self) -> bool {
        (self.flags & DO_FLAG) != 0
    }

    /// Set the DNSSEC OK (DO) flag
    pub fn set_do_flag(&mut self, value: bool) {
        if value {
            self.flags |= DO_FLAG;
        } else {
            self.flags &= !DO_FLAG;
        }
    }

    /// Add an EDNS option
    pub fn add_option(&mut self, code: u16, data: Vec<u8>) {
        self.options.push(EdnsOption { code, data });
    }

    /// Find an option by code
    pub fn find_option(&self, code: u16) -> Option<&EdnsOption> {
        self.options.iter().find(|opt| opt.code == code)
    }

    /// Attach an Extended DNS Error option: INFO-CODE then UTF-8 EXTRA-TEXT
    pub fn add_extended_error(&mut self, info_code: u16, extra_text: &str) {
        let mut data = Vec::with_capacity(2 + extra_text.len());
        data.extend_from_slice(&info_code.to_be_bytes());
        data.extend_from_slice(extra_text.as_bytes());
        self.add_option(EdnsOptionCode::ExtendedError.into(), data);
    }

    /// First Extended DNS Error carried, as (info code, extra text)
    pub fn extended_error(&self) -> Option<(u16, String)> {
        let option = self.find_option(EdnsOptionCode::ExtendedError.into())?;
        if option.data.len() < 2 {
            return None;
        }
        let code = u16::from_be_bytes([option.data[0], option.data[1]]);
        Some((code, String::from_utf8_lossy(&option.data[2..]).into_owned()))
    }

    /// Parse EDNS OPT record from DNS resource record data
    /// The OPT record uses the following format:
    /// - NAME: Root domain (empty)
    /// - TYPE: OPT (41)
    /// - CLASS: UDP payload size (16 bits)
    /// - TTL: Extended RCODE (8 bits) | Version (8 bits) | Flags (16 bits)
    /// - RDLENGTH: Length of option data
    /// - RDATA: Option data
    pub fn parse_from_resource(class: u16, ttl: u32, rdata: &[u8]) -> Result<Self, ParseError> {
        let extended_rcode = ((ttl >> 24) & 0xFF) as u8;
        let version = ((ttl >> 16) & 0xFF) as u8;
        let flags = (ttl & 0xFFFF) as u16;

        let mut options = Vec::new();
        let mut pos = 0;
        while pos < rdata.len() {
            if pos + 4 > rdata.len() {
                return Err(ParseError::InvalidRdata("truncated EDNS option header".into()));
            }
            let code = u16::from_be_bytes([rdata[pos], rdata[pos + 1]]);
            let length = u16::from_be_bytes([rdata[pos + 2], rdata[pos + 3]]) as usize;
            pos += 4;
            if pos + length > rdata.len() {
                return Err(ParseError::InvalidRdata("truncated EDNS option".into()));
            }
            options.push(EdnsOption {
                code,
                data: rdata[pos..pos + length].to_vec(),
            });
            pos += length;
        }

        Ok(EdnsOpt {
            udp_payload_size: class,
            extended_rcode,
            version,
            flags,
            options,
        })
    }

    /// Serialize EDNS OPT record to resource record format
    pub fn to_resource_format(&self) -> (u16, u32, Vec<u8>) {
        let ttl = ((self.extended_rcode as u32) << 24)
            | ((self.version as u32) << 16)
            | (self.flags as u32);

        let mut rdata = Vec::new();
        for option in &self.options {
            rdata.extend_from_slice(&option.code.to_be_bytes());
            rdata.extend_from_slice(&(option.data.len() as u16).to_be_bytes());
            rdata.extend_from_slice(&option.data);
        }

        (self.udp_payload_size, ttl, rdata)
    }
}

impl std::fmt::Display for EdnsOpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EDNS0: payload_size={}, version={}, do={}, options={}",
            self.udp_payload_size,
            self.version,
            self.do_flag(),
            self.options.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_do_flag() {
        let mut opt = EdnsOpt::new();
        assert!(!opt.do_flag());

        opt.set_do_flag(true);
        assert!(opt.do_flag());
        assert_eq!(opt.flags & 0x8000, 0x8000);

        opt.set_do_flag(false);
        assert!(!opt.do_flag());
    }

    #[test]
    fn test_extended_error_option() {
        let mut opt = EdnsOpt::new();
        opt.set_do_flag(true);
        opt.add_extended_error(7, "validate.bogus.sig_expired");

        let (class, ttl, rdata) = opt.to_resource_format();
        let parsed = EdnsOpt::parse_from_resource(class, ttl, &rdata).unwrap();
        assert!(parsed.do_flag());
        assert_eq!(
            parsed.extended_error(),
            Some((7, "validate.bogus.sig_expired".to_string()))
        );
    }

    #[test]
    fn test_truncated_option_rejected() {
        assert!(EdnsOpt::parse_from_resource(1232, 0, &[0, 15, 0, 9, 1]).is_err());
    }
}
