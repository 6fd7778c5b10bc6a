use std::fmt;

use super::errors::DnsSecError;

/// Security status of an RRset, a proof, or a whole response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecurityStatus {
    /// Not looked at yet
    #[default]
    Unchecked,
    /// Validation failed
    Bogus,
    /// Could not be determined, e.g. an error response
    Indeterminate,
    /// Proven to be outside any signed zone
    Insecure,
    /// Signature chain verified up to a trust anchor
    Secure,
}

impl SecurityStatus {
    pub fn is_secure(&self) -> bool {
        *self == SecurityStatus::Secure
    }

    /// Combine the statuses of every examined piece of a response.
    ///
    /// Bogus dominates, then insecure, then all-secure. Anything else,
    /// including no pieces at all, is indeterminate.
    pub fn aggregate<I: IntoIterator<Item = SecurityStatus>>(statuses: I) -> SecurityStatus {
        let mut any = false;
        let mut all_secure = true;
        let mut insecure = false;
        for status in statuses {
            any = true;
            match status {
                SecurityStatus::Bogus => return SecurityStatus::Bogus,
                SecurityStatus::Insecure => insecure = true,
                SecurityStatus::Secure => {}
                _ => all_secure = false,
            }
        }
        if insecure {
            SecurityStatus::Insecure
        } else if any && all_secure {
            SecurityStatus::Secure
        } else {
            SecurityStatus::Indeterminate
        }
    }
}

impl fmt::Display for SecurityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityStatus::Unchecked => "UNCHECKED",
            SecurityStatus::Bogus => "BOGUS",
            SecurityStatus::Indeterminate => "INDETERMINATE",
            SecurityStatus::Insecure => "INSECURE",
            SecurityStatus::Secure => "SECURE",
        };
        f.write_str(name)
    }
}

/// Extended DNS Error info codes (RFC 8914 §4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendedError {
    Other,
    UnsupportedDnskeyAlgorithm,
    UnsupportedDsDigestType,
    DnssecBogus,
    SignatureExpired,
    SignatureNotYetValid,
    DnskeyMissing,
    RrsigsMissing,
    NsecMissing,
    NoReachableAuthority,
    NetworkError,
    UnsupportedNsec3Iterations,
}

impl ExtendedError {
    pub fn code(&self) -> u16 {
        match self {
            ExtendedError::Other => 0,
            ExtendedError::UnsupportedDnskeyAlgorithm => 1,
            ExtendedError::UnsupportedDsDigestType => 2,
            ExtendedError::DnssecBogus => 6,
            ExtendedError::SignatureExpired => 7,
            ExtendedError::SignatureNotYetValid => 8,
            ExtendedError::DnskeyMissing => 9,
            ExtendedError::RrsigsMissing => 10,
            ExtendedError::NsecMissing => 12,
            ExtendedError::NoReachableAuthority => 22,
            ExtendedError::NetworkError => 23,
            ExtendedError::UnsupportedNsec3Iterations => 27,
        }
    }
}

/// A reason plus the context each enclosing validation step added.
///
/// Renders inner cause first, outer context after, colon separated:
/// `validate.bogus.missingsig: missing signature: b.example. A: failed.cname.broken`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Justification {
    reason: DnsSecError,
    context: Vec<String>,
}

impl Justification {
    pub fn new(reason: DnsSecError) -> Self {
        Self {
            reason,
            context: Vec::new(),
        }
    }

    /// Add an outer layer of context
    pub fn wrap(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn reason(&self) -> &DnsSecError {
        &self.reason
    }

    pub fn ede(&self) -> ExtendedError {
        self.reason.ede()
    }
}

impl From<DnsSecError> for Justification {
    fn from(reason: DnsSecError) -> Self {
        Justification::new(reason)
    }
}

impl fmt::Display for Justification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason.key(), self.reason)?;
        for context in &self.context {
            write!(f, ": {}", context)?;
        }
        Ok(())
    }
}

/// Outcome of validating one piece: a status and, unless secure, why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: SecurityStatus,
    pub justification: Option<Justification>,
}

impl Verdict {
    pub fn secure() -> Self {
        Self {
            status: SecurityStatus::Secure,
            justification: None,
        }
    }

    pub fn insecure(reason: impl Into<Justification>) -> Self {
        Self {
            status: SecurityStatus::Insecure,
            justification: Some(reason.into()),
        }
    }

    pub fn bogus(reason: impl Into<Justification>) -> Self {
        Self {
            status: SecurityStatus::Bogus,
            justification: Some(reason.into()),
        }
    }

    pub fn indeterminate(reason: impl Into<Justification>) -> Self {
        Self {
            status: SecurityStatus::Indeterminate,
            justification: Some(reason.into()),
        }
    }

    pub fn is_secure(&self) -> bool {
        self.status.is_secure()
    }

    pub fn is_bogus(&self) -> bool {
        self.status == SecurityStatus::Bogus
    }

    /// Add context to the justification, if there is one
    pub fn wrap(mut self, context: impl Into<String>) -> Self {
        self.justification = self.justification.map(|j| j.wrap(context));
        self
    }

    /// Fold many verdicts into one. The justification kept is the one of
    /// the first piece that carries the resulting status.
    ///
    /// One INSECURE piece makes the whole INSECURE even when other pieces
    /// are SECURE: a response is only as strong as its weakest RRset.
    pub fn combine<I: IntoIterator<Item = Verdict>>(verdicts: I) -> Verdict {
        let verdicts: Vec<Verdict> = verdicts.into_iter().collect();
        let status = SecurityStatus::aggregate(verdicts.iter().map(|v| v.status));
        let justification = verdicts
            .iter()
            .find(|v| v.status == status)
            .and_then(|v| v.justification.clone())
            .or_else(|| verdicts.iter().find_map(|v| v.justification.clone()));
        Verdict {
            status,
            justification: if status.is_secure() { None } else { justification },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SecurityStatus::*;

    #[test]
    fn test_aggregate() {
        assert_eq!(SecurityStatus::aggregate([Secure, Secure]), Secure);
        assert_eq!(SecurityStatus::aggregate([Secure, Bogus, Insecure]), Bogus);
        assert_eq!(SecurityStatus::aggregate([Insecure, Indeterminate]), Insecure);
        assert_eq!(SecurityStatus::aggregate([Secure, Insecure]), Insecure);
        assert_eq!(SecurityStatus::aggregate([Secure, Indeterminate]), Indeterminate);
        assert_eq!(SecurityStatus::aggregate([]), Indeterminate);
    }

    #[test]
    fn test_justification_chain() {
        let justification = Justification::new(DnsSecError::MissingSignature)
            .wrap("b.example. A")
            .wrap("failed.cname");
        assert_eq!(
            justification.to_string(),
            "validate.bogus.missingsig: missing signature: b.example. A: failed.cname"
        );
        assert_eq!(justification.ede().code(), 10);
    }

    #[test]
    fn test_combine_keeps_deciding_reason() {
        let combined = Verdict::combine([
            Verdict::secure(),
            Verdict::insecure(DnsSecError::NoTrustAnchor("example.".into())),
            Verdict::bogus(DnsSecError::MissingSignature),
        ]);
        assert!(combined.is_bogus());
        assert_eq!(
            combined.justification.unwrap().reason(),
            &DnsSecError::MissingSignature
        );
    }
}
