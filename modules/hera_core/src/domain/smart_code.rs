//! Smart code parsing
//!
//! Grammar: `HERA.<DOMAIN>.<SEG>{3,8}.v<N>`
//! - DOMAIN: 3-15 characters of `[A-Z0-9]`
//! - SEG: 2-30 characters of `[A-Z0-9_]`
//! - N: one or more decimal digits

use crate::contract::CoreError;
use std::fmt;
use std::str::FromStr;

const NAMESPACE: &str = "HERA";
const MIN_SEGMENTS: usize = 3;
const MAX_SEGMENTS: usize = 8;
const DOMAIN_LEN: std::ops::RangeInclusive<usize> = 3..=15;
const SEGMENT_LEN: std::ops::RangeInclusive<usize> = 2..=30;

/// A structurally valid smart code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SmartCode {
    domain: String,
    segments: Vec<String>,
    version: u32,
}

impl SmartCode {
    /// Parse and validate a candidate smart code
    pub fn parse(code: &str) -> Result<Self, CoreError> {
        let invalid = |details: String| CoreError::InvalidSmartCode {
            code: code.to_string(),
            details,
        };

        if code.is_empty() {
            return Err(invalid("smart code cannot be empty".to_string()));
        }

        let parts: Vec<&str> = code.split('.').collect();
        if parts[0] != NAMESPACE {
            return Err(invalid(format!("smart code must start with '{}.'", NAMESPACE)));
        }

        let version = match parts.last() {
            Some(last) if parts.len() > 1 => parse_version(last)
                .ok_or_else(|| invalid(format!("missing version suffix 'v<N>', found '{}'", last)))?,
            _ => return Err(invalid("missing version suffix 'v<N>'".to_string())),
        };

        if parts.len() < 3 {
            return Err(invalid("missing domain".to_string()));
        }
        let domain = parts[1];
        if !DOMAIN_LEN.contains(&domain.len())
            || !domain.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(invalid(format!(
                "domain '{}' must be 3-15 characters of A-Z or 0-9",
                domain
            )));
        }

        let segments = &parts[2..parts.len() - 1];
        if segments.len() < MIN_SEGMENTS || segments.len() > MAX_SEGMENTS {
            return Err(invalid(format!(
                "expected {}-{} segments between domain and version, found {}",
                MIN_SEGMENTS,
                MAX_SEGMENTS,
                segments.len()
            )));
        }
        for segment in segments {
            if !SEGMENT_LEN.contains(&segment.len())
                || !segment
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(invalid(format!(
                    "segment '{}' must be 2-30 characters of A-Z, 0-9 or '_'",
                    segment
                )));
            }
        }

        Ok(Self {
            domain: domain.to_string(),
            segments: segments.iter().map(|s| s.to_string()).collect(),
            version,
        })
    }

    /// Whether the string is a valid smart code
    pub fn is_valid(code: &str) -> bool {
        Self::parse(code).is_ok()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Dotted prefixes from most to least specific, version excluded:
    /// `HERA.D.A.B.C`, `HERA.D.A.B`, `HERA.D.A`, `HERA.D`
    pub fn prefixes(&self) -> Vec<String> {
        (0..=self.segments.len())
            .rev()
            .map(|n| {
                let mut prefix = format!("{}.{}", NAMESPACE, self.domain);
                for segment in &self.segments[..n] {
                    prefix.push('.');
                    prefix.push_str(segment);
                }
                prefix
            })
            .collect()
    }
}

fn parse_version(part: &str) -> Option<u32> {
    let digits = part.strip_prefix('v')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl FromStr for SmartCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SmartCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", NAMESPACE, self.domain)?;
        for segment in &self.segments {
            write!(f, ".{}", segment)?;
        }
        write!(f, ".v{}", self.version)
    }
}
