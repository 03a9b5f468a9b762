#![deny(warnings)]

//! Static property directory: a read-only table of [`PropertyRecord`]s loaded
//! once at startup, plus the explicit fallback policy for unknown codes.

use rust_decimal::Decimal;
use scenario_core::{
    validate_record, MonetizationStatus, PropertyId, PropertyRecord, Tier, ValidationError,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Directory shipped with the binary.
const BUILTIN_YAML: &str = include_str!("../../../assets/properties.yaml");

/// Monthly potential assumed for properties missing from the directory, in USD.
pub const FALLBACK_MONTHLY_POTENTIAL: i64 = 12_000;

/// Identifier absent from the directory.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("property not found: {0}")]
pub struct DirectoryMiss(pub PropertyId);

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("io error: {0}")]
    Io(String),
    #[error("yaml error: {0}")]
    Parse(String),
    #[error("invalid record: {0}")]
    Invalid(#[from] ValidationError),
    #[error("duplicate property identifier: {0}")]
    Duplicate(String),
    #[error("{property} lists unknown competitor {competitor}")]
    UnknownCompetitor {
        property: String,
        competitor: String,
    },
}

impl From<std::io::Error> for DirectoryError {
    fn from(e: std::io::Error) -> Self {
        DirectoryError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for DirectoryError {
    fn from(e: serde_yaml::Error) -> Self {
        DirectoryError::Parse(e.to_string())
    }
}

#[derive(Deserialize)]
struct DirectoryFile {
    properties: Vec<PropertyRecord>,
}

/// Conservative record for an identifier the directory does not know.
///
/// Never earning, zero revenue, basic tier, no competitors.
pub fn fallback_for(identifier: &PropertyId) -> PropertyRecord {
    PropertyRecord {
        identifier: identifier.clone(),
        name: identifier.0.clone(),
        address: "Address unavailable".to_string(),
        tier: Tier::Basic,
        monetization: MonetizationStatus::NotEarning,
        monthly_potential: Decimal::new(FALLBACK_MONTHLY_POTENTIAL, 0),
        monthly_revenue: Decimal::ZERO,
        competitors: vec![],
        seed_complaints: vec![],
    }
}

/// Read-only lookup table keyed by property identifier.
#[derive(Clone, Debug, Default)]
pub struct Directory {
    records: BTreeMap<PropertyId, PropertyRecord>,
}

impl Directory {
    /// Build from records, checking each record and cross-references.
    pub fn from_records(records: Vec<PropertyRecord>) -> Result<Self, DirectoryError> {
        let mut map = BTreeMap::new();
        for r in records {
            validate_record(&r)?;
            if map.contains_key(&r.identifier) {
                return Err(DirectoryError::Duplicate(r.identifier.0.clone()));
            }
            map.insert(r.identifier.clone(), r);
        }
        let ids: BTreeSet<&PropertyId> = map.keys().collect();
        for r in map.values() {
            for c in &r.competitors {
                if !ids.contains(c) {
                    return Err(DirectoryError::UnknownCompetitor {
                        property: r.identifier.0.clone(),
                        competitor: c.0.clone(),
                    });
                }
            }
        }
        Ok(Self { records: map })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, DirectoryError> {
        let file: DirectoryFile = serde_yaml::from_str(text)?;
        Self::from_records(file.properties)
    }

    /// Load a directory table from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// The table embedded from `assets/properties.yaml`.
    pub fn builtin() -> Result<Self, DirectoryError> {
        Self::from_yaml_str(BUILTIN_YAML)
    }

    pub fn lookup(&self, identifier: &PropertyId) -> Result<&PropertyRecord, DirectoryMiss> {
        self.records
            .get(identifier)
            .ok_or_else(|| DirectoryMiss(identifier.clone()))
    }

    /// Directory record, or [`fallback_for`] when the code is unknown.
    pub fn lookup_or_fallback(&self, identifier: &PropertyId) -> PropertyRecord {
        match self.lookup(identifier) {
            Ok(r) => r.clone(),
            Err(miss) => {
                warn!(%miss, "using fallback property record");
                fallback_for(identifier)
            }
        }
    }

    /// Tiers of a record's competitors, in listing order.
    ///
    /// Competitors outside this directory count with the fallback tier.
    pub fn competitor_tiers(&self, record: &PropertyRecord) -> Vec<Tier> {
        record
            .competitors
            .iter()
            .map(|c| match self.lookup(c) {
                Ok(r) => r.tier,
                Err(_) => fallback_for(c).tier,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &PropertyId> {
        self.records.keys()
    }
}
