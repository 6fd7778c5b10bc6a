use bitstream_io::{BigEndian, BitWriter};
use heimdall_dnssec::dns::common::{PacketComponent, WireReader};
use heimdall_dnssec::dns::header::DNSHeader;

fn write_header(header: &DNSHeader) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut writer = BitWriter::<_, BigEndian>::new(&mut buffer);
        header.write(&mut writer).expect("Failed to write header");
    }
    buffer
}

#[test]
fn test_header_read_write_roundtrip() {
    let original = DNSHeader {
        id: 0xABCD,
        qr: true,
        opcode: 2,
        aa: true,
        tc: false,
        rd: true,
        ra: false,
        z: false,
        ad: true,
        cd: true,
        rcode: 3,
        qdcount: 5,
        ancount: 2,
        nscount: 1,
        arcount: 0,
    };

    let buffer = write_header(&original);
    assert_eq!(buffer.len(), 12);

    let mut reader = WireReader::new(&buffer);
    let parsed = DNSHeader::read(&mut reader).expect("Failed to read header");
    assert_eq!(parsed, original);
}

#[test]
fn test_header_flags_packing() {
    let header = DNSHeader {
        id: 0x1234,
        qr: true,    // bit 15
        opcode: 0xA, // bits 14-11 (1010)
        aa: true,    // bit 10
        tc: false,   // bit 9
        rd: true,    // bit 8
        ra: false,   // bit 7
        z: true,     // bit 6
        ad: false,   // bit 5
        cd: true,    // bit 4
        rcode: 0xF,  // bits 3-0 (1111)
        ..Default::default()
    };

    let buffer = write_header(&header);

    assert_eq!(buffer[0], 0x12); // ID high byte
    assert_eq!(buffer[1], 0x34); // ID low byte
    assert_eq!(buffer[2], 0xD5); // QR=1, Opcode=1010, AA=1, TC=0, RD=1
    assert_eq!(buffer[3], 0x5F); // RA=0, Z=1, AD=0, CD=1, RCODE=1111
}

#[test]
fn test_security_bits_are_independent() {
    let ad_only = write_header(&DNSHeader {
        ad: true,
        ..Default::default()
    });
    let cd_only = write_header(&DNSHeader {
        cd: true,
        ..Default::default()
    });
    assert_eq!(ad_only[3], 0x20);
    assert_eq!(cd_only[3], 0x10);

    let parsed = DNSHeader::read(&mut WireReader::new(&ad_only)).unwrap();
    assert!(parsed.ad);
    assert!(!parsed.cd);
}

#[test]
fn test_short_header_rejected() {
    let buffer = [0x12, 0x34, 0x81, 0x80, 0x00];
    assert!(DNSHeader::read(&mut WireReader::new(&buffer)).is_err());
}

#[test]
fn test_header_default_values() {
    let header = DNSHeader::default();

    assert_eq!(header.id, 0);
    assert!(!header.qr);
    assert_eq!(header.opcode, 0);
    assert!(!header.aa);
    assert!(!header.tc);
    assert!(!header.rd);
    assert!(!header.ra);
    assert!(!header.z);
    assert!(!header.ad);
    assert!(!header.cd);
    assert_eq!(header.rcode, 0);
    assert_eq!(header.qdcount, 0);
    assert_eq!(header.ancount, 0);
    assert_eq!(header.nscount, 0);
    assert_eq!(header.arcount, 0);
}
