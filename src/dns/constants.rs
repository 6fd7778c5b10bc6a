/// DNS Response Code constants from RFC 1035 and subsequent RFCs
pub struct DNSRcode;

impl DNSRcode {
    pub const NOERROR: u8 = 0; // No error
    pub const FORMERR: u8 = 1; // Format error
    pub const SERVFAIL: u8 = 2; // Server failure
    pub const NXDOMAIN: u8 = 3; // Name error
    pub const NOTIMP: u8 = 4; // Not implemented
    pub const REFUSED: u8 = 5; // Query refused
    pub const YXDOMAIN: u8 = 6; // Name exists when it should not
    pub const YXRRSET: u8 = 7; // RR Set exists when it should not
    pub const NXRRSET: u8 = 8; // RR Set that should exist does not
    pub const NOTAUTH: u8 = 9; // Not authorized
    pub const NOTZONE: u8 = 10; // Name not contained in zone

    /// Mnemonic used in log lines and justifications
    pub fn name(rcode: u8) -> &'static str {
        match rcode {
            Self::NOERROR => "NOERROR",
            Self::FORMERR => "FORMERR",
            Self::SERVFAIL => "SERVFAIL",
            Self::NXDOMAIN => "NXDOMAIN",
            Self::NOTIMP => "NOTIMP",
            Self::REFUSED => "REFUSED",
            Self::YXDOMAIN => "YXDOMAIN",
            Self::YXRRSET => "YXRRSET",
            Self::NXRRSET => "NXRRSET",
            Self::NOTAUTH => "NOTAUTH",
            Self::NOTZONE => "NOTZONE",
            _ => "RESERVED",
        }
    }
}

/// Class used for the diagnostic TXT record carrying the validation reason
pub const VALIDATION_REASON_QCLASS: u16 = 65280;

/// EDNS option code for Extended DNS Errors (RFC 8914)
pub const EDNS_EXTENDED_ERROR: u16 = 15;

/// Maximum number of compression pointers followed while reading one name
pub const MAX_POINTER_HOPS: usize = 64;

/// Default EDNS UDP payload size advertised on outgoing queries
pub const DEFAULT_PAYLOAD_SIZE: u16 = 1232;
