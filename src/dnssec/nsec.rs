//! Denial of existence with NSEC records (RFC 4035 §5.4, RFC 4592 §5.3).
//!
//! Every function takes the NSEC RRsets of the authority section. Signature
//! checks happen before; these only reason about names and type bitmaps.

use tracing::trace;

use super::rrset::RRset;
use crate::dns::{enums::DNSResourceType, name::Name, rdata::NsecData};

fn entries<'a>(nsecs: &'a [&'a RRset]) -> impl Iterator<Item = (&'a Name, &'a NsecData)> {
    nsecs.iter().flat_map(|rrset| {
        rrset
            .records()
            .iter()
            .filter_map(move |r| r.as_nsec().map(|nsec| (rrset.name(), nsec)))
    })
}

/// Names at or below a delegation or DNAME owned by `owner` lie outside its zone
fn hides_descendants(nsec: &NsecData) -> bool {
    nsec.types.contains(DNSResourceType::DNAME)
        || (nsec.types.contains(DNSResourceType::NS) && !nsec.types.contains(DNSResourceType::SOA))
}

/// True when the NSEC at `owner` spans `qname`, i.e. `qname` sorts strictly
/// between owner and next name. The last NSEC of a zone wraps to the apex.
pub fn covers(owner: &Name, nsec: &NsecData, qname: &Name) -> bool {
    if qname == owner {
        return false;
    }
    if qname.is_strict_subdomain_of(owner) && hides_descendants(nsec) {
        return false;
    }
    let next = &nsec.next_domain;
    // a next name below qname makes qname an empty non-terminal
    if next.is_strict_subdomain_of(qname) {
        return false;
    }
    if owner < next {
        owner < qname && qname < next
    } else {
        owner < qname && qname.is_subdomain_of(next)
    }
}

/// Some NSEC proves that `qname` does not exist
pub fn proves_name_error(nsecs: &[&RRset], qname: &Name) -> bool {
    entries(nsecs).any(|(owner, nsec)| covers(owner, nsec, qname))
}

/// Closest encloser implied by the NSEC covering `qname`: the longer of the
/// ancestors qname shares with the NSEC owner and with its next name.
pub fn wildcard_closest_encloser(nsecs: &[&RRset], qname: &Name) -> Option<Name> {
    let (owner, nsec) = entries(nsecs).find(|(owner, nsec)| covers(owner, nsec, qname))?;
    let by_owner = qname.common_ancestor(owner);
    let by_next = qname.common_ancestor(&nsec.next_domain);
    let encloser = if by_owner.label_count() >= by_next.label_count() {
        by_owner
    } else {
        by_next
    };
    trace!("NSEC closest encloser of {} is {}", qname, encloser);
    Some(encloser)
}

/// The wildcard at `closest_encloser` is proven absent
pub fn proves_no_wildcard(nsecs: &[&RRset], closest_encloser: &Name) -> bool {
    let Ok(wildcard) = closest_encloser.wildcard() else {
        return false;
    };
    if entries(nsecs).any(|(owner, _)| *owner == wildcard) {
        return false;
    }
    entries(nsecs).any(|(owner, nsec)| covers(owner, nsec, &wildcard))
}

fn type_absent(nsec: &NsecData, qtype: DNSResourceType) -> bool {
    !nsec.types.contains(qtype) && !nsec.types.contains(DNSResourceType::CNAME)
}

/// NODATA for `qname`/`qtype`: an NSEC at qname without the type, an empty
/// non-terminal, or a matching wildcard without the type.
pub fn proves_nodata(nsecs: &[&RRset], qname: &Name, qtype: DNSResourceType) -> bool {
    if let Some((_, nsec)) = entries(nsecs).find(|(owner, _)| *owner == qname) {
        if !type_absent(nsec, qtype) {
            return false;
        }
        let has_ns = nsec.types.contains(DNSResourceType::NS);
        let has_soa = nsec.types.contains(DNSResourceType::SOA);
        if qtype == DNSResourceType::DS {
            // the child apex NSEC cannot speak for the parent side
            return !has_soa || qname.is_root();
        }
        // parent side of a delegation only speaks for DS
        return !(has_ns && !has_soa);
    }

    // qname is an empty non-terminal: the NSEC before it points below it
    if entries(nsecs).any(|(owner, nsec)| {
        owner < qname && nsec.next_domain.is_strict_subdomain_of(qname)
    }) {
        trace!("{} proven to be an empty non-terminal", qname);
        return true;
    }

    proves_wildcard_nodata(nsecs, qname, qtype)
}

fn proves_wildcard_nodata(nsecs: &[&RRset], qname: &Name, qtype: DNSResourceType) -> bool {
    let Some(encloser) = wildcard_closest_encloser(nsecs, qname) else {
        return false;
    };
    let Ok(wildcard) = encloser.wildcard() else {
        return false;
    };
    entries(nsecs)
        .find(|(owner, _)| **owner == wildcard)
        .is_some_and(|(_, nsec)| type_absent(nsec, qtype))
}

/// Result of checking that a wildcard expansion was legitimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardCheck {
    /// qname is proven absent and the wildcard's parent is its closest encloser
    Proven,
    /// qname, or a name between it and the wildcard, provably exists
    TooBroad,
    /// No proof either way
    Unproven,
}

/// Check a positive answer expanded from `*.<source>` for `qname`
pub fn check_wildcard_expansion(nsecs: &[&RRset], qname: &Name, source: &Name) -> WildcardCheck {
    if entries(nsecs).any(|(owner, _)| owner == qname) {
        return WildcardCheck::TooBroad;
    }
    match wildcard_closest_encloser(nsecs, qname) {
        Some(encloser) if encloser == *source => WildcardCheck::Proven,
        Some(encloser) if encloser.is_strict_subdomain_of(source) => WildcardCheck::TooBroad,
        _ => WildcardCheck::Unproven,
    }
}
