//! Privacy levels: which drop fields are sealed, and with which cipher.
//!
//! The three levels are totally ordered `standard < high < maximum`, and each
//! level's scope contains the scope of every level below it.

use crate::error::DropError;
use droplit_crypto::CipherSuite;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const FIELD_NOTES: &str = "notes";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_ENRICHMENT: &str = "enrichment";
pub const FIELD_MEDIA_REF: &str = "mediaRef";

const STANDARD_FIELDS: &[&str] = &[FIELD_NOTES];
const HIGH_FIELDS: &[&str] = &[FIELD_NOTES, FIELD_TEXT, FIELD_ENRICHMENT];
const MAXIMUM_FIELDS: &[&str] = &[FIELD_NOTES, FIELD_TEXT, FIELD_ENRICHMENT, FIELD_MEDIA_REF];

/// Named privacy level recorded on every encrypted drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    Standard,
    High,
    Maximum,
}

impl PrivacyLevel {
    pub const ALL: [PrivacyLevel; 3] =
        [PrivacyLevel::Standard, PrivacyLevel::High, PrivacyLevel::Maximum];

    pub fn as_str(self) -> &'static str {
        match self {
            PrivacyLevel::Standard => "standard",
            PrivacyLevel::High => "high",
            PrivacyLevel::Maximum => "maximum",
        }
    }

    pub fn scope(self) -> EncryptionScope {
        scope_for(self)
    }

    pub fn cipher(self) -> CipherParams {
        params_for(self)
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyLevel {
    type Err = DropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(PrivacyLevel::Standard),
            "high" => Ok(PrivacyLevel::High),
            "maximum" => Ok(PrivacyLevel::Maximum),
            other => Err(DropError::UnknownLevel(other.to_string())),
        }
    }
}

/// Ordered set of field names a level seals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionScope {
    fields: &'static [&'static str],
}

impl EncryptionScope {
    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| *f == field)
    }

    /// Fields this scope seals that `other` does not.
    pub fn added_from(&self, other: &EncryptionScope) -> Vec<&'static str> {
        self.fields
            .iter()
            .copied()
            .filter(|f| !other.contains(f))
            .collect()
    }

    /// Fields `other` seals that this scope does not.
    pub fn removed_from(&self, other: &EncryptionScope) -> Vec<&'static str> {
        other.added_from(self)
    }

    pub fn is_superset_of(&self, other: &EncryptionScope) -> bool {
        other.fields.iter().all(|f| self.contains(f))
    }
}

/// Cipher used for fields sealed at a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherParams {
    pub suite: CipherSuite,
    pub nonce_size: usize,
}

/// UI-facing description of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelInfo {
    pub level: PrivacyLevel,
    pub label: &'static str,
    pub description: &'static str,
}

pub const PRIVACY_LEVELS: [LevelInfo; 3] = [
    LevelInfo {
        level: PrivacyLevel::Standard,
        label: "Standard",
        description: "Notes are encrypted. Text and media stay searchable.",
    },
    LevelInfo {
        level: PrivacyLevel::High,
        label: "High",
        description: "Notes, captured text and AI enrichment are encrypted.",
    },
    LevelInfo {
        level: PrivacyLevel::Maximum,
        label: "Maximum",
        description: "Everything sensitive is encrypted, including media references.",
    },
];

pub fn scope_for(level: PrivacyLevel) -> EncryptionScope {
    let fields = match level {
        PrivacyLevel::Standard => STANDARD_FIELDS,
        PrivacyLevel::High => HIGH_FIELDS,
        PrivacyLevel::Maximum => MAXIMUM_FIELDS,
    };
    EncryptionScope { fields }
}

/// String-level lookup. Anything other than the three level names is
/// `UnknownLevel`.
pub fn scope_for_name(name: &str) -> Result<EncryptionScope, DropError> {
    Ok(scope_for(name.parse()?))
}

pub fn compare(a: PrivacyLevel, b: PrivacyLevel) -> Ordering {
    a.cmp(&b)
}

pub fn params_for(level: PrivacyLevel) -> CipherParams {
    let suite = match level {
        PrivacyLevel::Standard => CipherSuite::ChaCha20Poly1305,
        PrivacyLevel::High | PrivacyLevel::Maximum => CipherSuite::XChaCha20Poly1305,
    };
    CipherParams {
        suite,
        nonce_size: suite.nonce_size(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_only() {
        assert_eq!("standard".parse::<PrivacyLevel>().unwrap(), PrivacyLevel::Standard);
        assert_eq!("maximum".parse::<PrivacyLevel>().unwrap(), PrivacyLevel::Maximum);
        for bad in ["", "Maximum", "low", "max"] {
            assert!(matches!(
                bad.parse::<PrivacyLevel>(),
                Err(DropError::UnknownLevel(s)) if s == bad
            ));
        }
    }

    #[test]
    fn scope_for_name_rejects_unknown() {
        assert_eq!(scope_for_name("high").unwrap().fields(), HIGH_FIELDS);
        assert!(scope_for_name("secret").is_err());
    }

    #[test]
    fn order_is_total() {
        assert_eq!(compare(PrivacyLevel::Standard, PrivacyLevel::High), Ordering::Less);
        assert_eq!(compare(PrivacyLevel::Maximum, PrivacyLevel::High), Ordering::Greater);
        assert_eq!(compare(PrivacyLevel::High, PrivacyLevel::High), Ordering::Equal);
    }

    #[test]
    fn scopes_grow_with_level() {
        for pair in PrivacyLevel::ALL.windows(2) {
            assert!(pair[1].scope().is_superset_of(&pair[0].scope()));
            assert!(!pair[0].scope().is_superset_of(&pair[1].scope()));
        }
    }

    #[test]
    fn scope_deltas() {
        let standard = scope_for(PrivacyLevel::Standard);
        let maximum = scope_for(PrivacyLevel::Maximum);
        assert_eq!(
            maximum.added_from(&standard),
            vec![FIELD_TEXT, FIELD_ENRICHMENT, FIELD_MEDIA_REF]
        );
        assert_eq!(
            standard.removed_from(&maximum),
            vec![FIELD_TEXT, FIELD_ENRICHMENT, FIELD_MEDIA_REF]
        );
        assert!(standard.added_from(&maximum).is_empty());
    }

    #[test]
    fn cipher_params_match_suite() {
        assert_eq!(params_for(PrivacyLevel::Standard).nonce_size, 12);
        assert_eq!(params_for(PrivacyLevel::High).nonce_size, 24);
        assert_eq!(
            params_for(PrivacyLevel::Maximum).suite,
            CipherSuite::XChaCha20Poly1305
        );
    }

    #[test]
    fn level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PrivacyLevel::High).unwrap(), "\"high\"");
        assert!(serde_json::from_str::<PrivacyLevel>("\"extreme\"").is_err());
    }

    #[test]
    fn every_level_is_described() {
        let levels: Vec<_> = PRIVACY_LEVELS.iter().map(|info| info.level).collect();
        assert_eq!(levels, PrivacyLevel::ALL.to_vec());
    }
}
