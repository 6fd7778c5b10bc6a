use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info, trace};

use super::message::group_rrsets;
use super::rrset::RRset;
use crate::dns::{
    enums::{DNSResourceClass, DNSResourceType},
    name::Name,
    rdata::DNSResourceData,
    resource::{DNSResource, parse_wire_records},
};
use crate::error::{ConfigError, Result};

/// IANA root zone KSK-2017 and KSK-2024 as DS records
const ROOT_ANCHORS: &str = "\
. 172800 IN DS 20326 8 2 E06D44B80B8F1D39A95C0B0D7C65D08458E880409BBC683457104237C7F8EC8D
. 172800 IN DS 38696 8 2 683D2D0ACB8C9B712A1948B27F741219298D0A450D612C483AF444A4C0FB2B16
";

/// Pre-trusted key material for one zone: DS records, DNSKEY records, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    pub name: Name,
    pub class: DNSResourceClass,
    pub ds: Option<RRset>,
    pub dnskey: Option<RRset>,
}

impl TrustAnchor {
    fn new(name: Name, class: DNSResourceClass) -> Self {
        Self {
            name,
            class,
            ds: None,
            dnskey: None,
        }
    }

    fn merge(&mut self, rrset: &RRset) {
        let slot = match rrset.rtype() {
            DNSResourceType::DS => &mut self.ds,
            _ => &mut self.dnskey,
        };
        match slot {
            Some(existing) => {
                for record in rrset.records() {
                    existing.push_record(record.clone());
                }
            }
            None => *slot = Some(rrset.without_sigs()),
        }
    }

    /// Number of DS and DNSKEY records held
    pub fn record_count(&self) -> usize {
        self.ds.as_ref().map_or(0, RRset::len) + self.dnskey.as_ref().map_or(0, RRset::len)
    }
}

/// Zone-keyed registry of trust anchors with longest-ancestor lookup.
///
/// Shared between validations; lookups take a read lock, replacement swaps
/// the whole map under the write lock.
#[derive(Debug, Default)]
pub struct TrustAnchorStore {
    anchors: RwLock<HashMap<(Name, DNSResourceClass), TrustAnchor>>,
}

impl TrustAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a DS or DNSKEY RRset, merging with what is stored for its owner.
    pub fn store(&self, rrset: &RRset) -> Result<()> {
        let rrset = normalize(rrset)?;
        let mut anchors = self.anchors.write();
        insert(&mut anchors, &rrset);
        debug!("Stored trust anchor {} ({} records)", rrset, rrset.len());
        Ok(())
    }

    /// Store every RRset; nothing is stored if any of them is unacceptable.
    pub fn store_all(&self, rrsets: &[RRset]) -> Result<usize> {
        let normalized = rrsets.iter().map(normalize).collect::<Result<Vec<_>>>()?;
        let mut anchors = self.anchors.write();
        for rrset in &normalized {
            insert(&mut anchors, rrset);
        }
        Ok(normalized.len())
    }

    /// Anchor of the closest enclosing zone of `name` in `class`
    pub fn find(&self, name: &Name, class: DNSResourceClass) -> Option<TrustAnchor> {
        let anchors = self.anchors.read();
        let mut current = Some(name.clone());
        while let Some(candidate) = current {
            if let Some(anchor) = anchors.get(&(candidate.clone(), class)) {
                return Some(anchor.clone());
            }
            current = candidate.parent();
        }
        None
    }

    pub fn clear(&self) {
        self.anchors.write().clear();
    }

    /// Snapshot of every anchor, in canonical name order
    pub fn items(&self) -> Vec<TrustAnchor> {
        let mut items: Vec<TrustAnchor> = self.anchors.read().values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    /// Swap the whole content for `rrsets`. Validation happens before the
    /// lock is taken, so a bad set leaves the store untouched.
    pub fn replace_all(&self, rrsets: &[RRset]) -> Result<()> {
        let mut fresh = HashMap::new();
        for rrset in rrsets {
            insert(&mut fresh, &normalize(rrset)?);
        }
        *self.anchors.write() = fresh;
        Ok(())
    }

    /// Number of zones with an anchor
    pub fn len(&self) -> usize {
        self.anchors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.read().is_empty()
    }
}

fn insert(anchors: &mut HashMap<(Name, DNSResourceClass), TrustAnchor>, rrset: &RRset) {
    anchors
        .entry((rrset.name().clone(), rrset.rclass()))
        .or_insert_with(|| TrustAnchor::new(rrset.name().clone(), rrset.rclass()))
        .merge(rrset);
}

/// Check the type and lower-case the owner so case variants share one entry
fn normalize(rrset: &RRset) -> Result<RRset> {
    if !matches!(rrset.rtype(), DNSResourceType::DS | DNSResourceType::DNSKEY) {
        return Err(ConfigError::InvalidTrustAnchor(format!(
            "{} is not a DS or DNSKEY RRset",
            rrset
        )));
    }
    let owner = rrset.name().to_lowercase();
    let records = rrset
        .records()
        .iter()
        .map(|r| DNSResource {
            name: owner.clone(),
            ..r.clone()
        })
        .collect();
    RRset::from_records(records)
        .ok_or_else(|| ConfigError::InvalidTrustAnchor(format!("empty anchor {}", rrset)))
}

/// Where trust anchors come from
#[derive(Debug, Clone)]
pub enum TrustAnchorSource {
    /// Presentation-format file
    File(PathBuf),
    /// Presentation-format text
    Text(String),
    /// Uncompressed wire-format DS/DNSKEY record stream
    Wire(Vec<u8>),
    /// Already parsed records
    Records(Vec<DNSResource>),
    /// Built-in IANA root anchors
    RootDefaults,
}

impl TrustAnchorSource {
    /// Parse the source into anchor RRsets without touching any store.
    pub fn load(&self) -> Result<Vec<RRset>> {
        let records = match self {
            TrustAnchorSource::File(path) => load_anchor_file(path)?,
            TrustAnchorSource::Text(text) => parse_anchor_text(text)?,
            TrustAnchorSource::Wire(bytes) => parse_wire_records(bytes)
                .map_err(|e| ConfigError::InvalidTrustAnchor(e.to_string()))?,
            TrustAnchorSource::Records(records) => records.clone(),
            TrustAnchorSource::RootDefaults => parse_anchor_text(ROOT_ANCHORS)?,
        };

        if let Some(bad) = records
            .iter()
            .find(|r| !matches!(r.rtype, DNSResourceType::DS | DNSResourceType::DNSKEY))
        {
            return Err(ConfigError::InvalidTrustAnchor(format!(
                "{} {} is not a DS or DNSKEY record",
                bad.name, bad.rtype
            )));
        }
        let rrsets = group_rrsets(&records);
        info!("Loaded {} trust anchor RRsets from {}", rrsets.len(), self);
        Ok(rrsets)
    }
}

impl std::fmt::Display for TrustAnchorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustAnchorSource::File(path) => write!(f, "file {}", path.display()),
            TrustAnchorSource::Text(_) => f.write_str("text"),
            TrustAnchorSource::Wire(bytes) => write!(f, "wire ({} bytes)", bytes.len()),
            TrustAnchorSource::Records(records) => write!(f, "{} records", records.len()),
            TrustAnchorSource::RootDefaults => f.write_str("root defaults"),
        }
    }
}

pub fn load_anchor_file<P: AsRef<Path>>(path: P) -> Result<Vec<DNSResource>> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    parse_anchor_text(&contents).map_err(|e| match e {
        ConfigError::InvalidTrustAnchor(msg) => {
            ConfigError::InvalidTrustAnchor(format!("{}: {}", path.as_ref().display(), msg))
        }
        other => other,
    })
}

/// Parse anchors in zone file syntax: `owner [ttl] [class] DS|DNSKEY rdata`.
/// Comments and parenthesized multi-line records are accepted, `$` directives skipped.
pub fn parse_anchor_text(text: &str) -> Result<Vec<DNSResource>> {
    let mut records = Vec::new();
    let mut buffer = String::new();
    let mut depth = 0usize;
    let mut start_line = 0;

    for (index, raw) in text.lines().enumerate() {
        let line = strip_comment(raw);
        if depth == 0 {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('$') {
                trace!("Skipping directive on line {}", index + 1);
                continue;
            }
            start_line = index + 1;
        }

        for c in line.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        ConfigError::InvalidTrustAnchor(format!(
                            "Line {}: unbalanced parentheses",
                            index + 1
                        ))
                    })?
                }
                _ => {}
            }
        }
        buffer.push(' ');
        buffer.push_str(line);

        if depth == 0 {
            let record = parse_anchor_line(&buffer).map_err(|msg| {
                ConfigError::InvalidTrustAnchor(format!("Line {}: {}", start_line, msg))
            })?;
            records.push(record);
            buffer.clear();
        }
    }

    if depth > 0 {
        return Err(ConfigError::InvalidTrustAnchor(format!(
            "Unclosed parentheses starting at line {}",
            start_line
        )));
    }
    Ok(records)
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_anchor_line(line: &str) -> std::result::Result<DNSResource, String> {
    let cleaned = line.replace(['(', ')'], " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let (owner, rest) = tokens.split_first().ok_or("empty record")?;
    let name = Name::from_ascii(owner).map_err(|e| e.to_string())?;

    let mut ttl = 0;
    let mut class = DNSResourceClass::IN;
    let mut index = 0;
    while index < rest.len().min(2) {
        if let Ok(value) = rest[index].parse::<u32>() {
            ttl = value;
        } else if let Ok(value) = rest[index].parse::<DNSResourceClass>() {
            class = value;
        } else {
            break;
        }
        index += 1;
    }

    let rtype: DNSResourceType = rest
        .get(index)
        .ok_or("missing record type")?
        .parse()
        .map_err(|e: crate::dns::ParseError| e.to_string())?;
    if !matches!(rtype, DNSResourceType::DS | DNSResourceType::DNSKEY) {
        return Err(format!("{} is not a DS or DNSKEY record", rtype));
    }
    let rdata =
        DNSResourceData::from_presentation(rtype, &rest[index + 1..]).map_err(|e| e.to_string())?;
    Ok(DNSResource::new(name, class, ttl, rdata))
}
