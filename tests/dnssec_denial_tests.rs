use std::sync::Arc;

use heimdall_dnssec::{
    DNSPacket, SecurityStatus, ValidatedResponse,
    dns::{constants::DNSRcode, enums::DNSResourceType, rdata::DNSResourceData},
    dnssec::RRset,
};

mod common;
use common::*;

fn key_of(validated: &ValidatedResponse) -> &'static str {
    validated
        .justification
        .as_ref()
        .map(|j| j.reason().key())
        .unwrap_or("")
}

fn populated(zone: TestZone) -> TestZone {
    let mut zone = zone;
    zone.add_a("www.example.", 1)
        .add_a("host.sub.example.", 2)
        .add("www.example.", DNSResourceData::TXT(vec![b"v=spf1 -all".to_vec()]));
    zone
}

async fn validate(upstream: &Arc<MockUpstream>, qname: &str, qtype: DNSResourceType) -> ValidatedResponse {
    let raw = upstream.resolve(&name(qname), qtype);
    validate_raw(upstream, qname, qtype, raw).await
}

async fn validate_raw(
    upstream: &Arc<MockUpstream>,
    qname: &str,
    qtype: DNSResourceType,
    raw: DNSPacket,
) -> ValidatedResponse {
    resolver(upstream).validate_response(&query(qname, qtype), raw).await
}

fn nsec_upstream() -> Arc<MockUpstream> {
    Arc::new(MockUpstream::new(signed_hierarchy(populated(TestZone::signed(
        "example.", 2,
    )))))
}

fn nsec3_upstream(iterations: u16) -> Arc<MockUpstream> {
    Arc::new(MockUpstream::new(signed_hierarchy(populated(
        TestZone::signed("example.", 2).with_nsec3(iterations, false),
    ))))
}

#[tokio::test]
async fn test_nsec_nxdomain_is_secure() {
    let upstream = nsec_upstream();
    let validated = validate(&upstream, "nope.example.", DNSResourceType::A).await;

    assert_eq!(validated.status, SecurityStatus::Secure);
    assert_eq!(validated.packet.header.rcode, DNSRcode::NXDOMAIN);
    assert!(validated.packet.header.ad);
}

#[tokio::test]
async fn test_nsec_nxdomain_without_wildcard_denial_is_bogus() {
    let upstream = nsec_upstream();
    let zone = upstream.zone("example.");
    let wildcard_nsec = zone.nsec_covering(&name("*.example.")).unwrap();
    let name_nsec = zone.nsec_covering(&name("zzz.example.")).unwrap();
    assert_ne!(wildcard_nsec.name(), name_nsec.name());

    let mut raw = upstream.resolve(&name("zzz.example."), DNSResourceType::A);
    drop_records(&mut raw, wildcard_nsec.name(), DNSResourceType::NSEC);
    let validated = validate_raw(&upstream, "zzz.example.", DNSResourceType::A, raw).await;

    assert_eq!(validated.status, SecurityStatus::Bogus);
    assert_eq!(key_of(&validated), "failed.nxdomain");
    assert_eq!(validated.packet.header.rcode, DNSRcode::SERVFAIL);
}

#[tokio::test]
async fn test_nsec_nxdomain_without_any_denial_is_bogus() {
    let upstream = nsec_upstream();
    let mut raw = upstream.resolve(&name("nope.example."), DNSResourceType::A);
    drop_records(&mut raw, &name("example."), DNSResourceType::NSEC);
    drop_records(&mut raw, &name("www.example."), DNSResourceType::NSEC);
    let validated = validate_raw(&upstream, "nope.example.", DNSResourceType::A, raw).await;

    assert_eq!(validated.status, SecurityStatus::Bogus);
    assert_eq!(key_of(&validated), "failed.nsec_missing");
}

#[tokio::test]
async fn test_nsec_nodata_is_secure() {
    let upstream = nsec_upstream();
    let validated = validate(&upstream, "www.example.", DNSResourceType::AAAA).await;

    assert_eq!(validated.status, SecurityStatus::Secure);
    assert_eq!(validated.packet.header.rcode, DNSRcode::NOERROR);
    assert!(validated.packet.answers.is_empty());
}

#[tokio::test]
async fn test_nsec_nodata_for_present_type_is_bogus() {
    let upstream = nsec_upstream();
    let zone = upstream.zone("example.");
    let www = name("www.example.");

    // claims no A at www, with an NSEC that lists A
    let mut raw = response_for(&www, DNSResourceType::A);
    push(&mut raw.authorities, &zone.rrset(&zone.apex, DNSResourceType::SOA).unwrap());
    push(&mut raw.authorities, &zone.nsec_at(&www).unwrap());
    let validated = validate_raw(&upstream, "www.example.", DNSResourceType::A, raw).await;

    assert_eq!(validated.status, SecurityStatus::Bogus);
    assert_eq!(key_of(&validated), "failed.nodata");
}

#[tokio::test]
async fn test_nsec_empty_non_terminal() {
    let upstream = nsec_upstream();
    let validated = validate(&upstream, "sub.example.", DNSResourceType::A).await;

    assert_eq!(validated.status, SecurityStatus::Secure);
    assert_eq!(validated.packet.header.rcode, DNSRcode::NOERROR);
}

#[tokio::test]
async fn test_nsec_nxdomain_for_empty_non_terminal_is_bogus() {
    let upstream = nsec_upstream();
    let zone = upstream.zone("example.");
    let sub = name("sub.example.");

    // the apex NSEC points at host.sub.example., so sub.example. exists
    let apex_nsec = zone.nsec_at(&zone.apex).unwrap();
    let mut raw = response_for(&sub, DNSResourceType::A);
    raw.header.rcode = DNSRcode::NXDOMAIN;
    push(&mut raw.authorities, &zone.rrset(&zone.apex, DNSResourceType::SOA).unwrap());
    push(&mut raw.authorities, &apex_nsec);
    let validated = validate_raw(&upstream, "sub.example.", DNSResourceType::A, raw).await;

    assert_eq!(validated.status, SecurityStatus::Bogus);
    assert_eq!(key_of(&validated), "failed.nxdomain");
}

#[tokio::test]
async fn test_nsec3_nxdomain_is_secure() {
    let upstream = nsec3_upstream(10);
    let validated = validate(&upstream, "nope.example.", DNSResourceType::A).await;

    assert_eq!(validated.status, SecurityStatus::Secure);
    assert_eq!(validated.packet.header.rcode, DNSRcode::NXDOMAIN);
    assert!(validated.packet.header.ad);
}

#[tokio::test]
async fn test_nsec3_nxdomain_missing_any_piece_is_bogus() {
    let upstream = nsec3_upstream(10);
    let zone = upstream.zone("example.");
    let qname = name("nope.example.");
    let encloser = zone.closest_encloser(&qname);
    assert_eq!(encloser, zone.apex);

    let pieces = [
        ("closest encloser", zone.nsec3_matching(&encloser).unwrap()),
        ("next closer", zone.nsec3_covering(&qname).unwrap()),
        ("wildcard", zone.nsec3_covering(&encloser.wildcard().unwrap()).unwrap()),
    ];
    for (role, piece) in pieces {
        let mut raw = upstream.resolve(&qname, DNSResourceType::A);
        drop_records(&mut raw, piece.name(), DNSResourceType::NSEC3);
        let validated = validate_raw(&upstream, "nope.example.", DNSResourceType::A, raw).await;
        assert_eq!(validated.status, SecurityStatus::Bogus, "without the {} record", role);
    }
}

#[tokio::test]
async fn test_nsec3_nodata_is_secure() {
    let upstream = nsec3_upstream(10);
    let validated = validate(&upstream, "www.example.", DNSResourceType::AAAA).await;
    assert_eq!(validated.status, SecurityStatus::Secure);

    let ent = validate(&upstream, "sub.example.", DNSResourceType::A).await;
    assert_eq!(ent.status, SecurityStatus::Secure);
}

#[tokio::test]
async fn test_nsec3_iterations_over_ceiling_are_ignored() {
    // Ed25519 keys fall in the smallest bucket, 150 iterations by default
    let upstream = nsec3_upstream(200);
    let validated = validate(&upstream, "nope.example.", DNSResourceType::A).await;

    assert_eq!(validated.status, SecurityStatus::Insecure);
    assert_eq!(key_of(&validated), "insecure.nsec3_ignored");
    assert_eq!(validated.packet.header.rcode, DNSRcode::NXDOMAIN);
    assert!(!validated.packet.header.ad);
    let (code, _) = validated
        .packet
        .edns
        .as_ref()
        .and_then(|e| e.extended_error())
        .unwrap();
    assert_eq!(code, 27);
}

#[tokio::test]
async fn test_nsec3_unsigned_delegation_is_insecure() {
    let mut root = TestZone::signed(".", 1);
    let mut example = TestZone::signed("example.", 2).with_nsec3(5, false);
    let mut sub = TestZone::unsigned("sub.example.");
    sub.add_a("www.sub.example.", 4);
    example.delegate(&sub);
    root.delegate(&example);
    let upstream = Arc::new(MockUpstream::new(vec![root, example, sub]));

    let validated = validate(&upstream, "www.sub.example.", DNSResourceType::A).await;

    assert_eq!(validated.status, SecurityStatus::Insecure);
    assert_eq!(key_of(&validated), "insecure.ds.nsec3");
}

#[tokio::test]
async fn test_nsec3_opt_out_delegation_is_insecure() {
    let mut root = TestZone::signed(".", 1);
    let mut example = TestZone::signed("example.", 2).with_nsec3(5, true);
    let mut sub = TestZone::unsigned("sub.example.");
    sub.add_a("www.sub.example.", 4);
    example.delegate(&sub);
    root.delegate(&example);
    let upstream = Arc::new(MockUpstream::new(vec![root, example, sub]));
    assert!(upstream.zone("example.").nsec3_matching(&name("sub.example.")).is_none());

    let validated = validate(&upstream, "www.sub.example.", DNSResourceType::A).await;

    assert_eq!(validated.status, SecurityStatus::Insecure);
    assert_eq!(key_of(&validated), "insecure.ds.nsec3_optout");
}

fn wildcard_zone(zone: TestZone) -> TestZone {
    let mut zone = zone;
    zone.add_a("*.example.", 5)
        .add_a("sub.example.", 6)
        .add_a("www.example.", 1);
    zone
}

/// An answer for `qname` built from the signed wildcard set, with `proof`
/// in the authority section
fn expanded(zone: &TestZone, qname: &str, proof: &[RRset]) -> DNSPacket {
    let owner = name(qname);
    let source = zone
        .rrset(&name("*.example."), DNSResourceType::A)
        .unwrap();
    let mut packet = response_for(&owner, DNSResourceType::A);
    push(&mut packet.answers, &rename(&source, &owner));
    push_all(&mut packet.authorities, proof);
    packet
}

#[tokio::test]
async fn test_nsec_wildcard_expansion_is_secure() {
    let upstream = Arc::new(MockUpstream::new(signed_hierarchy(wildcard_zone(
        TestZone::signed("example.", 2),
    ))));
    let validated = validate(&upstream, "host.example.", DNSResourceType::A).await;

    assert_eq!(validated.status, SecurityStatus::Secure);
    assert!(
        validated
            .packet
            .answers
            .iter()
            .any(|r| r.rtype == DNSResourceType::A && r.name == name("host.example."))
    );
}

#[tokio::test]
async fn test_nsec_wildcard_nodata_is_secure() {
    let upstream = Arc::new(MockUpstream::new(signed_hierarchy(wildcard_zone(
        TestZone::signed("example.", 2),
    ))));
    let validated = validate(&upstream, "host.example.", DNSResourceType::TXT).await;

    assert_eq!(validated.status, SecurityStatus::Secure);
}

#[tokio::test]
async fn test_nsec_wildcard_without_proof_is_bogus() {
    let upstream = Arc::new(MockUpstream::new(signed_hierarchy(wildcard_zone(
        TestZone::signed("example.", 2),
    ))));
    let raw = expanded(upstream.zone("example."), "host.example.", &[]);
    let validated = validate_raw(&upstream, "host.example.", DNSResourceType::A, raw).await;

    assert_eq!(validated.status, SecurityStatus::Bogus);
}

#[tokio::test]
async fn test_nsec_wildcard_too_broad() {
    let upstream = Arc::new(MockUpstream::new(signed_hierarchy(wildcard_zone(
        TestZone::signed("example.", 2),
    ))));
    let zone = upstream.zone("example.");
    // x.sub.example. sits below an existing name, so *.example. cannot match it
    let proof = zone.nsec_covering(&name("x.sub.example.")).unwrap();
    assert_eq!(proof.name(), &name("sub.example."));
    let raw = expanded(zone, "x.sub.example.", &[proof]);

    let validated = validate_raw(&upstream, "x.sub.example.", DNSResourceType::A, raw).await;

    assert_eq!(validated.status, SecurityStatus::Bogus);
    assert_eq!(key_of(&validated), "failed.positive.wildcard_too_broad");
}

#[tokio::test]
async fn test_nsec3_wildcard_expansion_is_secure() {
    let upstream = Arc::new(MockUpstream::new(signed_hierarchy(wildcard_zone(
        TestZone::signed("example.", 2).with_nsec3(3, false),
    ))));
    let validated = validate(&upstream, "host.example.", DNSResourceType::A).await;

    assert_eq!(validated.status, SecurityStatus::Secure);
}

#[tokio::test]
async fn test_nsec3_wildcard_too_broad() {
    let upstream = Arc::new(MockUpstream::new(signed_hierarchy(wildcard_zone(
        TestZone::signed("example.", 2).with_nsec3(3, false),
    ))));
    let zone = upstream.zone("example.");
    let proof = zone.nsec3_matching(&name("sub.example.")).unwrap();
    let raw = expanded(zone, "x.sub.example.", &[proof]);

    let validated = validate_raw(&upstream, "x.sub.example.", DNSResourceType::A, raw).await;

    assert_eq!(validated.status, SecurityStatus::Bogus);
    assert_eq!(key_of(&validated), "failed.positive.wildcard_too_broad");
}

#[tokio::test]
async fn test_signed_referral_is_secure() {
    let mut root = TestZone::signed(".", 1);
    let mut example = TestZone::signed("example.", 2);
    let sub = TestZone::signed("sub.example.", 3);
    example.delegate(&sub);
    root.delegate(&example);
    let upstream = Arc::new(MockUpstream::new(vec![root, example, sub]));
    let zone = upstream.zone("example.");
    let cut = name("sub.example.");

    let mut raw = response_for(&name("www.sub.example."), DNSResourceType::A);
    raw.header.aa = false;
    push(&mut raw.authorities, &zone.rrset(&cut, DNSResourceType::NS).unwrap());
    push(&mut raw.authorities, &zone.rrset(&cut, DNSResourceType::DS).unwrap());
    let validated = validate_raw(&upstream, "www.sub.example.", DNSResourceType::A, raw).await;

    assert_eq!(validated.status, SecurityStatus::Secure);
}

#[tokio::test]
async fn test_unsigned_referral_is_insecure() {
    let mut root = TestZone::signed(".", 1);
    let mut example = TestZone::signed("example.", 2);
    let sub = TestZone::unsigned("sub.example.");
    example.delegate(&sub);
    root.delegate(&example);
    let upstream = Arc::new(MockUpstream::new(vec![root, example, sub]));
    let zone = upstream.zone("example.");
    let cut = name("sub.example.");

    let mut raw = response_for(&name("www.sub.example."), DNSResourceType::A);
    raw.header.aa = false;
    push(&mut raw.authorities, &zone.rrset(&cut, DNSResourceType::NS).unwrap());
    push(&mut raw.authorities, &zone.nsec_at(&cut).unwrap());
    let validated = validate_raw(&upstream, "www.sub.example.", DNSResourceType::A, raw).await;

    assert_eq!(validated.status, SecurityStatus::Insecure);
    assert_eq!(key_of(&validated), "insecure.ds.nsec");
}

#[tokio::test]
async fn test_referral_with_ds_and_soa_is_bogus() {
    let mut root = TestZone::signed(".", 1);
    let mut example = TestZone::signed("example.", 2);
    let sub = TestZone::signed("sub.example.", 3);
    example.delegate(&sub);
    root.delegate(&example);
    let upstream = Arc::new(MockUpstream::new(vec![root, example, sub]));
    let zone = upstream.zone("example.");
    let child = upstream.zone("sub.example.");
    let cut = name("sub.example.");

    // parent-side DS next to the child's own SOA at the same owner
    let mut raw = response_for(&name("www.sub.example."), DNSResourceType::A);
    raw.header.aa = false;
    push(&mut raw.authorities, &zone.rrset(&cut, DNSResourceType::NS).unwrap());
    push(&mut raw.authorities, &zone.rrset(&cut, DNSResourceType::DS).unwrap());
    push(&mut raw.authorities, &child.rrset(&cut, DNSResourceType::SOA).unwrap());
    let validated = validate_raw(&upstream, "www.sub.example.", DNSResourceType::A, raw).await;

    assert_eq!(validated.status, SecurityStatus::Bogus);
    assert_eq!(key_of(&validated), "failed.referral.ds_with_soa");
}
