use crate::dns::rdata::DnsKeyData;

/// Calculate the key tag (footprint) of a DNSKEY (RFC 4034 Appendix B)
pub fn calculate_key_tag(key: &DnsKeyData) -> u16 {
    // RSA/MD5 uses the most significant 16 of the least significant 24 bits of the modulus
    if key.algorithm == 1 {
        let len = key.public_key.len();
        if len >= 3 {
            return u16::from_be_bytes([key.public_key[len - 3], key.public_key[len - 2]]);
        }
        return 0;
    }

    let header = [
        (key.flags >> 8) as u8,
        key.flags as u8,
        key.protocol,
        key.algorithm,
    ];
    let mut accumulator: u32 = 0;
    for (i, &byte) in header.iter().chain(key.public_key.iter()).enumerate() {
        if i % 2 == 0 {
            accumulator += u32::from(byte) << 8;
        } else {
            accumulator += u32::from(byte);
        }
    }

    accumulator += (accumulator >> 16) & 0xFFFF;
    (accumulator & 0xFFFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_tag_checksum() {
        let key = DnsKeyData {
            flags: 0x0100,
            protocol: 3,
            algorithm: 15,
            public_key: vec![0x00, 0x01],
        };
        // 16-bit words: 0x0100 + 0x030f + 0x0001 = 0x0410
        assert_eq!(calculate_key_tag(&key), 0x0410);
    }

    #[test]
    fn test_key_tag_carry_folding() {
        let key = DnsKeyData {
            flags: 0xFFFF,
            protocol: 0xFF,
            algorithm: 0xFF,
            public_key: vec![0xFF, 0xFF],
        };
        // 3 * 0xFFFF = 0x2FFFD, folded: 0xFFFD + 0x2 = 0xFFFF
        assert_eq!(calculate_key_tag(&key), 0xFFFF);
    }

    #[test]
    fn test_key_tag_rsamd5() {
        let key = DnsKeyData {
            flags: 0x0101,
            protocol: 3,
            algorithm: 1,
            public_key: vec![0x12, 0x34, 0x56, 0x78],
        };
        assert_eq!(calculate_key_tag(&key), 0x3456);
    }
}
