use super::rrset::RRset;
use super::status::{Justification, SecurityStatus, Verdict};
use crate::dns::{enums::DNSResourceClass, name::Name};

/// Outcome of priming one zone's keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEntry {
    /// Verified DNSKEY RRset
    Good {
        name: Name,
        class: DNSResourceClass,
        keys: RRset,
    },
    /// Proven to have no keys; everything below is insecure
    Null {
        name: Name,
        class: DNSResourceClass,
        justification: Justification,
    },
    /// Keys could not be established
    Bad {
        name: Name,
        class: DNSResourceClass,
        justification: Justification,
    },
}

impl KeyEntry {
    pub fn good(keys: RRset) -> Self {
        KeyEntry::Good {
            name: keys.name().clone(),
            class: keys.rclass(),
            keys,
        }
    }

    pub fn null(name: Name, class: DNSResourceClass, reason: impl Into<Justification>) -> Self {
        KeyEntry::Null {
            name,
            class,
            justification: reason.into(),
        }
    }

    pub fn bad(name: Name, class: DNSResourceClass, reason: impl Into<Justification>) -> Self {
        KeyEntry::Bad {
            name,
            class,
            justification: reason.into(),
        }
    }

    /// Zone the entry describes
    pub fn name(&self) -> &Name {
        match self {
            KeyEntry::Good { name, .. } | KeyEntry::Null { name, .. } | KeyEntry::Bad { name, .. } => {
                name
            }
        }
    }

    pub fn class(&self) -> DNSResourceClass {
        match self {
            KeyEntry::Good { class, .. }
            | KeyEntry::Null { class, .. }
            | KeyEntry::Bad { class, .. } => *class,
        }
    }

    pub fn keys(&self) -> Option<&RRset> {
        match self {
            KeyEntry::Good { keys, .. } => Some(keys),
            _ => None,
        }
    }

    pub fn status(&self) -> SecurityStatus {
        match self {
            KeyEntry::Good { .. } => SecurityStatus::Secure,
            KeyEntry::Null { .. } => SecurityStatus::Insecure,
            KeyEntry::Bad { .. } => SecurityStatus::Bogus,
        }
    }

    pub fn justification(&self) -> Option<&Justification> {
        match self {
            KeyEntry::Good { .. } => None,
            KeyEntry::Null { justification, .. } | KeyEntry::Bad { justification, .. } => {
                Some(justification)
            }
        }
    }

    pub fn is_good(&self) -> bool {
        matches!(self, KeyEntry::Good { .. })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, KeyEntry::Null { .. })
    }

    pub fn is_bad(&self) -> bool {
        matches!(self, KeyEntry::Bad { .. })
    }

    /// Verdict for data that would have needed these keys, when they are not good
    pub fn to_verdict(&self) -> Verdict {
        Verdict {
            status: self.status(),
            justification: self.justification().cloned(),
        }
    }
}

impl std::fmt::Display for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyEntry::Good { keys, .. } => write!(f, "good key entry {} ({} keys)", keys, keys.len()),
            KeyEntry::Null {
                name,
                justification,
                ..
            } => write!(f, "null key entry {} ({})", name, justification),
            KeyEntry::Bad {
                name,
                justification,
                ..
            } => write!(f, "bad key entry {} ({})", name, justification),
        }
    }
}
