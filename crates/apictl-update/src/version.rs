//! Semantic versions as exchanged with the update service
//!
//! Precedence follows semver: the numeric core first, then prerelease
//! identifiers, with build metadata never taking part. Equality is
//! structural, so two versions differing only in build compare `Equal`
//! but are not `==`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building a [`Version`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty version string")]
    Empty,

    #[error("expected major.minor.patch, got {0:?}")]
    InvalidCore(String),

    #[error("{component} version {value:?} is not a non-negative integer")]
    InvalidNumber {
        component: &'static str,
        value: String,
    },

    #[error("empty {0} section")]
    EmptySection(&'static str),

    #[error("invalid identifier {0:?}: only [0-9A-Za-z-] allowed")]
    InvalidIdentifier(String),
}

/// A semantic version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "VersionRepr", into = "VersionRepr")]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    prereleases: Vec<String>,
    build: String,
}

impl Version {
    /// A release version with no prerelease or build
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prereleases: Vec::new(),
            build: String::new(),
        }
    }

    /// Parse `major.minor.patch[-prerelease][+build]`
    ///
    /// A leading `v` and surrounding whitespace are accepted. Empty
    /// prerelease tokens (`1.0.0-alpha..1`) are dropped.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let text = text.trim();
        let text = text.strip_prefix('v').unwrap_or(text);
        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        let (rest, build) = match text.split_once('+') {
            Some((_, "")) => return Err(ParseError::EmptySection("build")),
            Some((rest, build)) => (rest, build),
            None => (text, ""),
        };

        let (core, pre) = match rest.split_once('-') {
            Some((_, "")) => return Err(ParseError::EmptySection("prerelease")),
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(ParseError::InvalidCore(core.to_string()));
        };

        let version = Self::new(
            parse_number("major", major)?,
            parse_number("minor", minor)?,
            parse_number("patch", patch)?,
        );

        let version = match pre {
            Some(pre) => version.with_prereleases(pre.split('.'))?,
            None => version,
        };
        version.with_build(build)
    }

    /// Replace the prerelease identifiers, dropping empty ones
    pub fn with_prereleases<I, S>(mut self, tokens: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut prereleases = Vec::new();
        for token in tokens {
            let token = token.as_ref();
            if token.is_empty() {
                continue;
            }
            validate_identifier(token)?;
            prereleases.push(token.to_string());
        }
        self.prereleases = prereleases;
        Ok(self)
    }

    /// Replace the build metadata (dot-separated identifiers, or empty)
    pub fn with_build(mut self, build: impl Into<String>) -> Result<Self, ParseError> {
        let build = build.into();
        if !build.is_empty() {
            for ident in build.split('.') {
                if ident.is_empty() {
                    return Err(ParseError::EmptySection("build"));
                }
                validate_identifier(ident)?;
            }
        }
        self.build = build;
        Ok(self)
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn prereleases(&self) -> &[String] {
        &self.prereleases
    }

    pub fn build(&self) -> &str {
        &self.build
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prereleases.is_empty()
    }

    /// Semver precedence, ignoring build metadata
    pub fn precedence(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| compare_prereleases(&self.prereleases, &other.prereleases))
    }
}

/// Total order over versions; build metadata is ignored
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.precedence(b)
}

/// True iff `candidate` has strictly higher precedence than `current`
pub fn is_update_available(current: &Version, candidate: &Version) -> bool {
    compare(current, candidate) == Ordering::Less
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence(other)
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prereleases.is_empty() {
            write!(f, "-{}", self.prereleases.join("."))?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}

fn parse_number(component: &'static str, value: &str) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        component,
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}

fn validate_identifier(ident: &str) -> Result<(), ParseError> {
    if ident
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        Ok(())
    } else {
        Err(ParseError::InvalidIdentifier(ident.to_string()))
    }
}

fn compare_prereleases(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    for (x, y) in a.iter().zip(b.iter()) {
        let ord = compare_identifier(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn is_numeric(ident: &str) -> bool {
    ident.bytes().all(|b| b.is_ascii_digit())
}

fn compare_identifier(a: &str, b: &str) -> Ordering {
    match (is_numeric(a), is_numeric(b)) {
        (true, true) => compare_digits(a, b),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

// Digit strings of any length: strip leading zeros, longer wins, then lexical.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[derive(Serialize, Deserialize)]
struct VersionRepr {
    #[serde(default)]
    major: u64,
    #[serde(default)]
    minor: u64,
    #[serde(default)]
    patch: u64,
    #[serde(default)]
    prereleases: Vec<String>,
    #[serde(default)]
    build: String,
}

impl TryFrom<VersionRepr> for Version {
    type Error = ParseError;

    fn try_from(repr: VersionRepr) -> Result<Self, Self::Error> {
        Version::new(repr.major, repr.minor, repr.patch)
            .with_prereleases(repr.prereleases)?
            .with_build(repr.build)
    }
}

impl From<Version> for VersionRepr {
    fn from(v: Version) -> Self {
        Self {
            major: v.major,
            minor: v.minor,
            patch: v.patch,
            prereleases: v.prereleases,
            build: v.build,
        }
    }
}
