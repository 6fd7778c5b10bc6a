use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::dnssec::{DigestType, DnsSecAlgorithm};
use crate::error::ConfigError;

/// Hard upper bound on any configured NSEC3 iteration ceiling (RFC 9276 era practice)
pub const MAX_NSEC3_ITERATIONS: u16 = 2500;

/// Validation policy threaded into every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// DS digests in order of preference, strongest first
    pub digest_preference: Vec<DigestType>,

    /// Algorithms excluded by policy even if this build supports them
    pub disabled_algorithms: Vec<DnsSecAlgorithm>,

    /// Digests excluded by policy
    pub disabled_digests: Vec<DigestType>,

    /// Reject a DS RRset validated through a weaker digest than one it offers
    pub harden_algo_downgrade: bool,

    /// NSEC3 iteration ceilings keyed by key size in bits
    pub nsec3_iterations: BTreeMap<u32, u16>,

    /// Signatures evaluated per RRset (0 = unlimited)
    pub max_validate_rrsigs: usize,

    /// Alias links followed before giving up
    pub max_cname_chain: usize,

    /// Attach the diagnostic TXT record to non-secure responses
    pub add_reason_to_response: bool,

    /// Presentation-format trust anchor file
    pub trust_anchor_file: Option<PathBuf>,

    /// Load the built-in IANA root anchors
    pub use_root_anchor_defaults: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            digest_preference: vec![DigestType::Sha384, DigestType::Sha256, DigestType::Sha1],
            disabled_algorithms: Vec::new(),
            disabled_digests: Vec::new(),
            harden_algo_downgrade: true,
            nsec3_iterations: BTreeMap::from([(1024, 150), (2048, 500), (4096, 2500)]),
            max_validate_rrsigs: 0,
            max_cname_chain: 16,
            add_reason_to_response: true,
            trust_anchor_file: None,
            use_root_anchor_defaults: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Token {
    Number(u64),
    Text(String),
}

impl Token {
    fn as_text(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Text(s) => s.clone(),
        }
    }
}

/// On-disk shape; every key optional so files only state what they change
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawValidatorConfig {
    digest_preference: Option<String>,
    disabled_algorithms: Option<Vec<Token>>,
    disabled_digests: Option<Vec<Token>>,
    harden_algo_downgrade: Option<bool>,
    nsec3_iterations: Option<BTreeMap<String, u16>>,
    max_validate_rrsigs: Option<usize>,
    max_cname_chain: Option<usize>,
    add_reason_to_response: Option<bool>,
    trust_anchor_file: Option<PathBuf>,
    use_root_anchor_defaults: Option<bool>,
}

impl ValidatorConfig {
    /// Parse a TOML document on top of the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawValidatorConfig = toml::from_str(contents)?;
        let mut config = Self::default();

        if let Some(preference) = raw.digest_preference {
            config.digest_preference = parse_digest_preference(&preference)?;
        }
        if let Some(tokens) = raw.disabled_algorithms {
            config.disabled_algorithms = tokens
                .iter()
                .map(|t| t.as_text().parse::<DnsSecAlgorithm>())
                .collect::<Result<_, _>>()?;
        }
        if let Some(tokens) = raw.disabled_digests {
            config.disabled_digests = tokens
                .iter()
                .map(|t| t.as_text().parse::<DigestType>())
                .collect::<Result<_, _>>()?;
        }
        if let Some(table) = raw.nsec3_iterations {
            config.nsec3_iterations = table
                .into_iter()
                .map(|(bits, iterations)| Ok((parse_key_size(&bits)?, iterations)))
                .collect::<Result<_, ConfigError>>()?;
        }
        if let Some(value) = raw.harden_algo_downgrade {
            config.harden_algo_downgrade = value;
        }
        if let Some(value) = raw.max_validate_rrsigs {
            config.max_validate_rrsigs = value;
        }
        if let Some(value) = raw.max_cname_chain {
            config.max_cname_chain = value;
        }
        if let Some(value) = raw.add_reason_to_response {
            config.add_reason_to_response = value;
        }
        if raw.trust_anchor_file.is_some() {
            config.trust_anchor_file = raw.trust_anchor_file;
        }
        if let Some(value) = raw.use_root_anchor_defaults {
            config.use_root_anchor_defaults = value;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        debug!("Loading validator configuration from {}", path.as_ref().display());
        Self::from_toml_str(&contents)
    }

    /// Defaults overridden by `HEIMDALL_DNSSEC_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(preference) = lookup("HEIMDALL_DNSSEC_DIGEST_PREFERENCE") {
            config.digest_preference = parse_digest_preference(&preference)?;
        }

        if let Some(list) = lookup("HEIMDALL_DNSSEC_DISABLED_ALGORITHMS") {
            config.disabled_algorithms = split_list(&list)
                .map(str::parse::<DnsSecAlgorithm>)
                .collect::<Result<_, _>>()?;
        }

        if let Some(list) = lookup("HEIMDALL_DNSSEC_DISABLED_DIGESTS") {
            config.disabled_digests = split_list(&list)
                .map(str::parse::<DigestType>)
                .collect::<Result<_, _>>()?;
        }

        if let Some(value) = lookup("HEIMDALL_DNSSEC_HARDEN_ALGO_DOWNGRADE") {
            config.harden_algo_downgrade =
                parse_bool("HEIMDALL_DNSSEC_HARDEN_ALGO_DOWNGRADE", &value)?;
        }

        if let Some(table) = lookup("HEIMDALL_DNSSEC_NSEC3_ITERATIONS") {
            config.nsec3_iterations = parse_iteration_table(&table)?;
        }

        if let Some(value) = lookup("HEIMDALL_DNSSEC_MAX_VALIDATE_RRSIGS") {
            config.max_validate_rrsigs = parse_number("HEIMDALL_DNSSEC_MAX_VALIDATE_RRSIGS", &value)?;
        }

        if let Some(value) = lookup("HEIMDALL_DNSSEC_MAX_CNAME_CHAIN") {
            config.max_cname_chain = parse_number("HEIMDALL_DNSSEC_MAX_CNAME_CHAIN", &value)?;
        }

        if let Some(value) = lookup("HEIMDALL_DNSSEC_ADD_REASON") {
            config.add_reason_to_response = parse_bool("HEIMDALL_DNSSEC_ADD_REASON", &value)?;
        }

        if let Some(path) = lookup("HEIMDALL_DNSSEC_TRUST_ANCHOR_FILE") {
            config.trust_anchor_file = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup("HEIMDALL_DNSSEC_ROOT_ANCHORS") {
            config.use_root_anchor_defaults = parse_bool("HEIMDALL_DNSSEC_ROOT_ANCHORS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nsec3_iterations.is_empty() {
            return Err(ConfigError::InvalidIterations(
                "at least one key size entry is required".to_string(),
            ));
        }

        let mut previous: Option<u16> = None;
        for (&bits, &iterations) in &self.nsec3_iterations {
            if bits == 0 {
                return Err(ConfigError::InvalidIterations(
                    "key size must be greater than 0".to_string(),
                ));
            }
            if iterations > MAX_NSEC3_ITERATIONS {
                return Err(ConfigError::InvalidIterations(format!(
                    "{} iterations for {} bit keys exceeds {}",
                    iterations, bits, MAX_NSEC3_ITERATIONS
                )));
            }
            if previous.is_some_and(|p| iterations < p) {
                return Err(ConfigError::InvalidIterations(format!(
                    "ceiling for {} bit keys is below that of a smaller key size",
                    bits
                )));
            }
            previous = Some(iterations);
        }

        if self.digest_preference.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "digest_preference".to_string(),
                value: String::new(),
            });
        }

        if self.max_cname_chain == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_cname_chain".to_string(),
                value: "0".to_string(),
            });
        }

        if !self.digest_preference.iter().any(|d| self.digest_enabled(d.to_u8())) {
            warn!("No preferred DS digest is enabled; every DS RRset will be insecure");
        }

        Ok(())
    }

    /// Supported by this build and not disabled by policy
    pub fn algorithm_enabled(&self, algorithm: u8) -> bool {
        DnsSecAlgorithm::from_u8(algorithm)
            .is_some_and(|a| a.is_supported() && !self.disabled_algorithms.contains(&a))
    }

    pub fn digest_enabled(&self, digest: u8) -> bool {
        DigestType::from_u8(digest)
            .is_some_and(|d| d.is_supported() && !self.disabled_digests.contains(&d))
    }

    /// Position of an enabled digest in the preference order, 0 strongest
    pub fn digest_rank(&self, digest: u8) -> Option<usize> {
        if !self.digest_enabled(digest) {
            return None;
        }
        self.digest_preference
            .iter()
            .position(|d| d.to_u8() == digest)
    }

    /// Ceiling for a zone whose smallest key has `key_bits`: the entry for
    /// the smallest configured size at least that large, else the largest entry.
    pub fn max_nsec3_iterations(&self, key_bits: u32) -> u16 {
        self.nsec3_iterations
            .range(key_bits..)
            .next()
            .or_else(|| self.nsec3_iterations.iter().next_back())
            .map(|(_, &iterations)| iterations)
            .unwrap_or(0)
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a comma separated digest list such as `SHA-384,SHA-256,SHA-1`
pub fn parse_digest_preference(list: &str) -> Result<Vec<DigestType>, ConfigError> {
    let mut digests = Vec::new();
    for token in split_list(list) {
        let digest: DigestType = token.parse()?;
        if !digests.contains(&digest) {
            digests.push(digest);
        }
    }
    Ok(digests)
}

/// Parse `1024=150,2048=500` into an iteration table
fn parse_iteration_table(table: &str) -> Result<BTreeMap<u32, u16>, ConfigError> {
    split_list(table)
        .map(|entry| {
            let (bits, iterations) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidIterations(entry.to_string()))?;
            let iterations = iterations
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidIterations(entry.to_string()))?;
            Ok((parse_key_size(bits)?, iterations))
        })
        .collect()
}

fn parse_key_size(bits: &str) -> Result<u32, ConfigError> {
    bits.trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidIterations(format!("bad key size {}", bits)))
}

fn parse_number(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
