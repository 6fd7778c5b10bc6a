use std::collections::BTreeSet;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use super::{ParseError, common::WireReader, enums::DNSResourceType, name::Name};

/// Flag bits of a DNSKEY (RFC 4034 §2.1.1, RFC 5011 §3)
pub const DNSKEY_FLAG_ZONE: u16 = 0x0100;
pub const DNSKEY_FLAG_REVOKE: u16 = 0x0080;
pub const DNSKEY_FLAG_SEP: u16 = 0x0001;

/// The only protocol value a DNSKEY may carry
pub const DNSKEY_PROTOCOL: u8 = 3;

/// NSEC3 opt-out flag (RFC 5155 §3.1.2)
pub const NSEC3_FLAG_OPT_OUT: u8 = 0x01;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoaData {
    pub mname: Name,
    pub rname: Name,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DsData {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsKeyData {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

impl DnsKeyData {
    pub fn is_zone_key(&self) -> bool {
        self.flags & DNSKEY_FLAG_ZONE != 0
    }

    pub fn is_sep(&self) -> bool {
        self.flags & DNSKEY_FLAG_SEP != 0
    }

    pub fn is_revoked(&self) -> bool {
        self.flags & DNSKEY_FLAG_REVOKE != 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RrsigData {
    pub type_covered: DNSResourceType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer_name: Name,
    pub signature: Vec<u8>,
}

impl RrsigData {
    /// RDATA up to and excluding the signature, signer name lower-cased.
    /// This is the prefix of the signed data (RFC 4034 §3.1.8.1).
    pub fn write_signed_prefix(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&u16::from(self.type_covered).to_be_bytes());
        out.push(self.algorithm);
        out.push(self.labels);
        out.extend_from_slice(&self.original_ttl.to_be_bytes());
        out.extend_from_slice(&self.expiration.to_be_bytes());
        out.extend_from_slice(&self.inception.to_be_bytes());
        out.extend_from_slice(&self.key_tag.to_be_bytes());
        self.signer_name.write_canonical(out);
    }
}

/// Type bitmap shared by NSEC and NSEC3 (RFC 4034 §4.1.2)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeBitmap {
    types: BTreeSet<u16>,
}

impl TypeBitmap {
    pub fn new<I: IntoIterator<Item = DNSResourceType>>(types: I) -> Self {
        Self {
            types: types.into_iter().map(u16::from).collect(),
        }
    }

    pub fn contains(&self, rtype: DNSResourceType) -> bool {
        self.types.contains(&u16::from(rtype))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = DNSResourceType> + '_ {
        self.types.iter().map(|&t| DNSResourceType::from(t))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut types = BTreeSet::new();
        let mut pos = 0;
        let mut last_window: Option<u8> = None;
        while pos < bytes.len() {
            if pos + 2 > bytes.len() {
                return Err(ParseError::InvalidRdata("truncated type bitmap".into()));
            }
            let window = bytes[pos];
            let len = bytes[pos + 1] as usize;
            pos += 2;
            if len == 0 || len > 32 || pos + len > bytes.len() {
                return Err(ParseError::InvalidRdata("bad type bitmap length".into()));
            }
            if last_window.is_some_and(|last| window <= last) {
                return Err(ParseError::InvalidRdata("type bitmap windows out of order".into()));
            }
            last_window = Some(window);
            for (i, byte) in bytes[pos..pos + len].iter().enumerate() {
                for bit in 0..8 {
                    if byte & (0x80 >> bit) != 0 {
                        types.insert(((window as u16) << 8) | (i * 8 + bit) as u16);
                    }
                }
            }
            pos += len;
        }
        Ok(Self { types })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut iter = self.types.iter().peekable();
        while let Some(&first) = iter.peek() {
            let window = (first >> 8) as u8;
            let mut bitmap = [0u8; 32];
            let mut used = 0;
            while let Some(&&t) = iter.peek() {
                if (t >> 8) as u8 != window {
                    break;
                }
                let low = (t & 0xFF) as usize;
                bitmap[low / 8] |= 0x80 >> (low % 8);
                used = low / 8 + 1;
                iter.next();
            }
            out.push(window);
            out.push(used as u8);
            out.extend_from_slice(&bitmap[..used]);
        }
    }
}

impl FromIterator<DNSResourceType> for TypeBitmap {
    fn from_iter<I: IntoIterator<Item = DNSResourceType>>(iter: I) -> Self {
        TypeBitmap::new(iter)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NsecData {
    pub next_domain: Name,
    pub types: TypeBitmap,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nsec3Data {
    pub hash_algorithm: u8,
    pub flags: u8,
    pub iterations: u16,
    pub salt: Vec<u8>,
    pub next_hashed: Vec<u8>,
    pub types: TypeBitmap,
}

impl Nsec3Data {
    pub fn opt_out(&self) -> bool {
        self.flags & NSEC3_FLAG_OPT_OUT != 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nsec3ParamData {
    pub hash_algorithm: u8,
    pub flags: u8,
    pub iterations: u16,
    pub salt: Vec<u8>,
}

/// Base32 with the "extended hex" alphabet, lower-cased, unpadded (RFC 4648 §7)
pub fn base32hex_encode(bytes: &[u8]) -> String {
    base32::encode(base32::Alphabet::Rfc4648Hex { padding: false }, bytes).to_ascii_lowercase()
}

pub fn base32hex_decode(text: &str) -> Option<Vec<u8>> {
    base32::decode(
        base32::Alphabet::Rfc4648Hex { padding: false },
        &text.to_ascii_uppercase(),
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DNSResourceData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    NS(Name),
    CNAME(Name),
    DNAME(Name),
    PTR(Name),
    MX { preference: u16, exchange: Name },
    TXT(Vec<Vec<u8>>),
    SOA(SoaData),
    DS(DsData),
    DNSKEY(DnsKeyData),
    RRSIG(RrsigData),
    NSEC(NsecData),
    NSEC3(Nsec3Data),
    NSEC3PARAM(Nsec3ParamData),
    Unknown(Vec<u8>),
}

impl Default for DNSResourceData {
    fn default() -> Self {
        DNSResourceData::Unknown(Vec::new())
    }
}

impl DNSResourceData {
    /// The record type implied by the variant; `None` for opaque data.
    pub fn rtype(&self) -> Option<DNSResourceType> {
        let rtype = match self {
            DNSResourceData::A(_) => DNSResourceType::A,
            DNSResourceData::AAAA(_) => DNSResourceType::AAAA,
            DNSResourceData::NS(_) => DNSResourceType::NS,
            DNSResourceData::CNAME(_) => DNSResourceType::CNAME,
            DNSResourceData::DNAME(_) => DNSResourceType::DNAME,
            DNSResourceData::PTR(_) => DNSResourceType::PTR,
            DNSResourceData::MX { .. } => DNSResourceType::MX,
            DNSResourceData::TXT(_) => DNSResourceType::TXT,
            DNSResourceData::SOA(_) => DNSResourceType::SOA,
            DNSResourceData::DS(_) => DNSResourceType::DS,
            DNSResourceData::DNSKEY(_) => DNSResourceType::DNSKEY,
            DNSResourceData::RRSIG(_) => DNSResourceType::RRSIG,
            DNSResourceData::NSEC(_) => DNSResourceType::NSEC,
            DNSResourceData::NSEC3(_) => DNSResourceType::NSEC3,
            DNSResourceData::NSEC3PARAM(_) => DNSResourceType::NSEC3PARAM,
            DNSResourceData::Unknown(_) => return None,
        };
        Some(rtype)
    }

    /// Decode RDATA of `rtype`; `reader` must be windowed to exactly the RDATA.
    pub fn decode(rtype: DNSResourceType, reader: &mut WireReader<'_>) -> Result<Self, ParseError> {
        let rdata = match rtype {
            DNSResourceType::A => {
                let b = reader.take(4)?;
                DNSResourceData::A(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
            }
            DNSResourceType::AAAA => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(reader.take(16)?);
                DNSResourceData::AAAA(Ipv6Addr::from(octets))
            }
            DNSResourceType::NS => DNSResourceData::NS(reader.read_name()?),
            DNSResourceType::CNAME => DNSResourceData::CNAME(reader.read_name()?),
            DNSResourceType::DNAME => DNSResourceData::DNAME(reader.read_name()?),
            DNSResourceType::PTR => DNSResourceData::PTR(reader.read_name()?),
            DNSResourceType::MX => DNSResourceData::MX {
                preference: reader.read_u16()?,
                exchange: reader.read_name()?,
            },
            DNSResourceType::TXT => {
                let mut strings = Vec::new();
                while !reader.is_empty() {
                    let len = reader.read_u8()? as usize;
                    strings.push(reader.take(len)?.to_vec());
                }
                DNSResourceData::TXT(strings)
            }
            DNSResourceType::SOA => DNSResourceData::SOA(SoaData {
                mname: reader.read_name()?,
                rname: reader.read_name()?,
                serial: reader.read_u32()?,
                refresh: reader.read_u32()?,
                retry: reader.read_u32()?,
                expire: reader.read_u32()?,
                minimum: reader.read_u32()?,
            }),
            DNSResourceType::DS => DNSResourceData::DS(DsData {
                key_tag: reader.read_u16()?,
                algorithm: reader.read_u8()?,
                digest_type: reader.read_u8()?,
                digest: reader.take_rest().to_vec(),
            }),
            DNSResourceType::DNSKEY => DNSResourceData::DNSKEY(DnsKeyData {
                flags: reader.read_u16()?,
                protocol: reader.read_u8()?,
                algorithm: reader.read_u8()?,
                public_key: reader.take_rest().to_vec(),
            }),
            DNSResourceType::RRSIG => DNSResourceData::RRSIG(RrsigData {
                type_covered: reader.read_u16()?.into(),
                algorithm: reader.read_u8()?,
                labels: reader.read_u8()?,
                original_ttl: reader.read_u32()?,
                expiration: reader.read_u32()?,
                inception: reader.read_u32()?,
                key_tag: reader.read_u16()?,
                signer_name: reader.read_name()?,
                signature: reader.take_rest().to_vec(),
            }),
            DNSResourceType::NSEC => DNSResourceData::NSEC(NsecData {
                next_domain: reader.read_name()?,
                types: TypeBitmap::decode(reader.take_rest())?,
            }),
            DNSResourceType::NSEC3 => {
                let hash_algorithm = reader.read_u8()?;
                let flags = reader.read_u8()?;
                let iterations = reader.read_u16()?;
                let salt_len = reader.read_u8()? as usize;
                let salt = reader.take(salt_len)?.to_vec();
                let hash_len = reader.read_u8()? as usize;
                if hash_len == 0 {
                    return Err(ParseError::InvalidRdata("empty NSEC3 next hash".into()));
                }
                let next_hashed = reader.take(hash_len)?.to_vec();
                DNSResourceData::NSEC3(Nsec3Data {
                    hash_algorithm,
                    flags,
                    iterations,
                    salt,
                    next_hashed,
                    types: TypeBitmap::decode(reader.take_rest())?,
                })
            }
            DNSResourceType::NSEC3PARAM => {
                let hash_algorithm = reader.read_u8()?;
                let flags = reader.read_u8()?;
                let iterations = reader.read_u16()?;
                let salt_len = reader.read_u8()? as usize;
                DNSResourceData::NSEC3PARAM(Nsec3ParamData {
                    hash_algorithm,
                    flags,
                    iterations,
                    salt: reader.take(salt_len)?.to_vec(),
                })
            }
            _ => DNSResourceData::Unknown(reader.take_rest().to_vec()),
        };

        if !reader.is_empty() {
            return Err(ParseError::InvalidRdata(format!(
                "{} trailing bytes in {} RDATA",
                reader.remaining(),
                rtype
            )));
        }
        Ok(rdata)
    }

    /// Uncompressed wire form with names as stored
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out, false);
        out
    }

    /// Canonical wire form (RFC 4034 §6.2 as amended by RFC 6840 §5.1):
    /// embedded names of the listed types are lower-cased, NSEC next names are not.
    pub fn to_canonical_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out, true);
        out
    }

    fn encode(&self, out: &mut Vec<u8>, canonical: bool) {
        let write_name = |name: &Name, out: &mut Vec<u8>| {
            if canonical {
                name.write_canonical(out)
            } else {
                name.write_wire(out)
            }
        };

        match self {
            DNSResourceData::A(addr) => out.extend_from_slice(&addr.octets()),
            DNSResourceData::AAAA(addr) => out.extend_from_slice(&addr.octets()),
            DNSResourceData::NS(name)
            | DNSResourceData::CNAME(name)
            | DNSResourceData::DNAME(name)
            | DNSResourceData::PTR(name) => write_name(name, out),
            DNSResourceData::MX {
                preference,
                exchange,
            } => {
                out.extend_from_slice(&preference.to_be_bytes());
                write_name(exchange, out);
            }
            DNSResourceData::TXT(strings) => {
                for s in strings {
                    out.push(s.len() as u8);
                    out.extend_from_slice(s);
                }
            }
            DNSResourceData::SOA(soa) => {
                write_name(&soa.mname, out);
                write_name(&soa.rname, out);
                for value in [soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum] {
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
            DNSResourceData::DS(ds) => {
                out.extend_from_slice(&ds.key_tag.to_be_bytes());
                out.push(ds.algorithm);
                out.push(ds.digest_type);
                out.extend_from_slice(&ds.digest);
            }
            DNSResourceData::DNSKEY(key) => {
                out.extend_from_slice(&key.flags.to_be_bytes());
                out.push(key.protocol);
                out.push(key.algorithm);
                out.extend_from_slice(&key.public_key);
            }
            DNSResourceData::RRSIG(sig) => {
                if canonical {
                    sig.write_signed_prefix(out);
                } else {
                    let mut prefix = Vec::new();
                    sig.write_signed_prefix(&mut prefix);
                    // swap the lower-cased signer back for the stored one
                    let signer_len = sig.signer_name.wire_len();
                    prefix.truncate(prefix.len() - signer_len);
                    sig.signer_name.write_wire(&mut prefix);
                    out.extend_from_slice(&prefix);
                }
                out.extend_from_slice(&sig.signature);
            }
            DNSResourceData::NSEC(nsec) => {
                nsec.next_domain.write_wire(out);
                nsec.types.encode(out);
            }
            DNSResourceData::NSEC3(nsec3) => {
                out.push(nsec3.hash_algorithm);
                out.push(nsec3.flags);
                out.extend_from_slice(&nsec3.iterations.to_be_bytes());
                out.push(nsec3.salt.len() as u8);
                out.extend_from_slice(&nsec3.salt);
                out.push(nsec3.next_hashed.len() as u8);
                out.extend_from_slice(&nsec3.next_hashed);
                nsec3.types.encode(out);
            }
            DNSResourceData::NSEC3PARAM(param) => {
                out.push(param.hash_algorithm);
                out.push(param.flags);
                out.extend_from_slice(&param.iterations.to_be_bytes());
                out.push(param.salt.len() as u8);
                out.extend_from_slice(&param.salt);
            }
            DNSResourceData::Unknown(bytes) => out.extend_from_slice(bytes),
        }
    }

    /// Parse presentation-format RDATA tokens. Only the key material types
    /// that trust anchors are written in are supported.
    pub fn from_presentation(rtype: DNSResourceType, tokens: &[&str]) -> Result<Self, ParseError> {
        let bad = |what: &str| ParseError::InvalidPresentation(format!("{} {}", rtype, what));
        match rtype {
            DNSResourceType::DS => {
                if tokens.len() < 4 {
                    return Err(bad("needs key tag, algorithm, digest type and digest"));
                }
                let digest = hex::decode(tokens[3..].concat()).map_err(|_| bad("digest is not hex"))?;
                Ok(DNSResourceData::DS(DsData {
                    key_tag: tokens[0].parse().map_err(|_| bad("key tag"))?,
                    algorithm: tokens[1].parse().map_err(|_| bad("algorithm"))?,
                    digest_type: tokens[2].parse().map_err(|_| bad("digest type"))?,
                    digest,
                }))
            }
            DNSResourceType::DNSKEY => {
                if tokens.len() < 4 {
                    return Err(bad("needs flags, protocol, algorithm and key"));
                }
                let public_key = BASE64
                    .decode(tokens[3..].concat())
                    .map_err(|_| bad("key is not base64"))?;
                Ok(DNSResourceData::DNSKEY(DnsKeyData {
                    flags: tokens[0].parse().map_err(|_| bad("flags"))?,
                    protocol: tokens[1].parse().map_err(|_| bad("protocol"))?,
                    algorithm: tokens[2].parse().map_err(|_| bad("algorithm"))?,
                    public_key,
                }))
            }
            other => Err(ParseError::InvalidPresentation(format!(
                "unsupported presentation type {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DNSResourceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSResourceData::A(addr) => write!(f, "{}", addr),
            DNSResourceData::AAAA(addr) => write!(f, "{}", addr),
            DNSResourceData::NS(name)
            | DNSResourceData::CNAME(name)
            | DNSResourceData::DNAME(name)
            | DNSResourceData::PTR(name) => write!(f, "{}", name),
            DNSResourceData::MX {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            DNSResourceData::TXT(strings) => {
                let parts: Vec<String> = strings
                    .iter()
                    .map(|s| format!("\"{}\"", String::from_utf8_lossy(s)))
                    .collect();
                f.write_str(&parts.join(" "))
            }
            DNSResourceData::SOA(soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                soa.mname, soa.rname, soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum
            ),
            DNSResourceData::DS(ds) => write!(
                f,
                "{} {} {} {}",
                ds.key_tag,
                ds.algorithm,
                ds.digest_type,
                hex::encode_upper(&ds.digest)
            ),
            DNSResourceData::DNSKEY(key) => write!(
                f,
                "{} {} {} {}",
                key.flags,
                key.protocol,
                key.algorithm,
                BASE64.encode(&key.public_key)
            ),
            DNSResourceData::RRSIG(sig) => write!(
                f,
                "{} {} {} {} {} {} {} {} {}",
                sig.type_covered,
                sig.algorithm,
                sig.labels,
                sig.original_ttl,
                sig.expiration,
                sig.inception,
                sig.key_tag,
                sig.signer_name,
                BASE64.encode(&sig.signature)
            ),
            DNSResourceData::NSEC(nsec) => {
                write!(f, "{}", nsec.next_domain)?;
                for t in nsec.types.iter() {
                    write!(f, " {}", t)?;
                }
                Ok(())
            }
            DNSResourceData::NSEC3(nsec3) => {
                let salt = if nsec3.salt.is_empty() {
                    "-".to_string()
                } else {
                    hex::encode_upper(&nsec3.salt)
                };
                write!(
                    f,
                    "{} {} {} {} {}",
                    nsec3.hash_algorithm,
                    nsec3.flags,
                    nsec3.iterations,
                    salt,
                    base32hex_encode(&nsec3.next_hashed)
                )?;
                for t in nsec3.types.iter() {
                    write!(f, " {}", t)?;
                }
                Ok(())
            }
            DNSResourceData::NSEC3PARAM(param) => write!(
                f,
                "{} {} {} {}",
                param.hash_algorithm,
                param.flags,
                param.iterations,
                if param.salt.is_empty() {
                    "-".to_string()
                } else {
                    hex::encode_upper(&param.salt)
                }
            ),
            DNSResourceData::Unknown(bytes) => write!(f, "\\# {} {}", bytes.len(), hex::encode(bytes)),
        }
    }
}
