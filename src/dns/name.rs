use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use smallvec::SmallVec;

use super::ParseError;

pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_LABEL_LENGTH: usize = 63;

type Labels = SmallVec<[Vec<u8>; 6]>;

/// A domain name held as raw labels, leftmost first, without the root label.
///
/// Case is preserved for display and wire output, but equality, hashing and
/// ordering are case-insensitive. `Ord` is the RFC 4034 §6.1 canonical order.
#[derive(Clone, Debug, Default)]
pub struct Name {
    labels: Labels,
}

impl Name {
    pub fn root() -> Self {
        Self {
            labels: SmallVec::new(),
        }
    }

    /// Parse presentation format (`www.example.`, `www.example` or `.`).
    /// Supports `\.` and `\DDD` escapes.
    pub fn from_ascii(input: &str) -> Result<Self, ParseError> {
        if input.is_empty() || input == "." {
            return Ok(Self::root());
        }

        let bytes = input.as_bytes();
        let mut labels = Labels::new();
        let mut current = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    if current.is_empty() {
                        return Err(ParseError::InvalidLabel);
                    }
                    labels.push(std::mem::take(&mut current));
                }
                b'\\' => {
                    let rest = &bytes[i + 1..];
                    if rest.len() >= 3 && rest[..3].iter().all(u8::is_ascii_digit) {
                        let value = (rest[0] - b'0') as u16 * 100
                            + (rest[1] - b'0') as u16 * 10
                            + (rest[2] - b'0') as u16;
                        if value > 255 {
                            return Err(ParseError::InvalidLabel);
                        }
                        current.push(value as u8);
                        i += 3;
                    } else if let Some(&escaped) = rest.first() {
                        current.push(escaped);
                        i += 1;
                    } else {
                        return Err(ParseError::InvalidLabel);
                    }
                }
                other => current.push(other),
            }
            i += 1;
        }
        if !current.is_empty() {
            labels.push(current);
        }

        Self::checked(labels)
    }

    pub fn from_labels<I, L>(labels: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let labels = labels
            .into_iter()
            .map(|l| l.as_ref().to_vec())
            .collect::<Labels>();
        Self::checked(labels)
    }

    fn checked(labels: Labels) -> Result<Self, ParseError> {
        let mut wire_len = 1;
        for label in &labels {
            if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
                return Err(ParseError::InvalidLabel);
            }
            wire_len += label.len() + 1;
        }
        if wire_len > MAX_NAME_LENGTH {
            return Err(ParseError::NameTooLong);
        }
        Ok(Self { labels })
    }

    pub fn labels(&self) -> impl DoubleEndedIterator<Item = &[u8]> + ExactSizeIterator {
        self.labels.iter().map(Vec::as_slice)
    }

    pub fn first_label(&self) -> Option<&[u8]> {
        self.labels.first().map(Vec::as_slice)
    }

    /// Number of labels, not counting the root
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        self.first_label() == Some(b"*")
    }

    pub fn parent(&self) -> Option<Name> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            labels: self.labels[1..].iter().cloned().collect(),
        })
    }

    /// Keep only the rightmost `count` labels.
    pub fn trim_to(&self, count: usize) -> Name {
        let skip = self.labels.len().saturating_sub(count);
        Self {
            labels: self.labels[skip..].iter().cloned().collect(),
        }
    }

    pub fn prepend_label(&self, label: &[u8]) -> Result<Name, ParseError> {
        let mut labels = Labels::with_capacity(self.labels.len() + 1);
        labels.push(label.to_vec());
        labels.extend(self.labels.iter().cloned());
        Self::checked(labels)
    }

    /// The wildcard directly below this name (`*.<self>`)
    pub fn wildcard(&self) -> Result<Name, ParseError> {
        self.prepend_label(b"*")
    }

    /// True when `self` equals `other` or lies below it.
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        if other.labels.len() > self.labels.len() {
            return false;
        }
        self.labels
            .iter()
            .rev()
            .zip(other.labels.iter().rev())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    pub fn is_strict_subdomain_of(&self, other: &Name) -> bool {
        self.labels.len() > other.labels.len() && self.is_subdomain_of(other)
    }

    /// Longest common suffix of two names
    pub fn common_ancestor(&self, other: &Name) -> Name {
        let shared = self
            .labels
            .iter()
            .rev()
            .zip(other.labels.iter().rev())
            .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
            .count();
        self.trim_to(shared)
    }

    /// Swap `suffix` for `replacement`, as DNAME substitution does.
    pub fn replace_suffix(&self, suffix: &Name, replacement: &Name) -> Result<Name, ParseError> {
        if !self.is_subdomain_of(suffix) {
            return Err(ParseError::InvalidLabel);
        }
        let keep = self.labels.len() - suffix.labels.len();
        let labels = self.labels[..keep]
            .iter()
            .chain(replacement.labels.iter())
            .cloned()
            .collect();
        Self::checked(labels)
    }

    pub fn to_lowercase(&self) -> Name {
        Self {
            labels: self
                .labels
                .iter()
                .map(|l| l.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Length of the uncompressed wire form, including the root label
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Uncompressed wire form, case preserved
    pub fn write_wire(&self, out: &mut Vec<u8>) {
        for label in &self.labels {
            out.push(label.len() as u8);
            out.extend_from_slice(label);
        }
        out.push(0);
    }

    /// Canonical wire form: uncompressed and lower-cased (RFC 4034 §6.2)
    pub fn write_canonical(&self, out: &mut Vec<u8>) {
        for label in &self.labels {
            out.push(label.len() as u8);
            out.extend(label.iter().map(u8::to_ascii_lowercase));
        }
        out.push(0);
    }

    pub fn to_canonical_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        self.write_canonical(&mut out);
        out
    }

    /// RFC 4034 §6.1: compare label by label starting from the rightmost,
    /// each label as a lower-cased octet string.
    pub fn canonical_cmp(&self, other: &Name) -> Ordering {
        let mut left = self.labels.iter().rev();
        let mut right = other.labels.iter().rev();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => {
                    let ord = a
                        .iter()
                        .map(u8::to_ascii_lowercase)
                        .cmp(b.iter().map(u8::to_ascii_lowercase));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.labels.len());
        for label in &self.labels {
            state.write_usize(label.len());
            for b in label {
                state.write_u8(b.to_ascii_lowercase());
            }
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_cmp(other)
    }
}

impl FromStr for Name {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::from_ascii(s)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in &self.labels {
            for &b in label {
                match b {
                    b'.' | b'\\' | b'"' | b'(' | b')' | b';' | b'@' | b'$' => {
                        write!(f, "\\{}", b as char)?
                    }
                    0x21..=0x7e => write!(f, "{}", b as char)?,
                    _ => write!(f, "\\{:03}", b)?,
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}
