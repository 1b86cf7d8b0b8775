//! Patient record store and name lookup
//!
//! Records are loaded once from a JSON object keyed by full patient name and
//! are read-only afterwards. Lookups never fail: every outcome, including
//! "not found" and "which one did you mean", is a [`LookupOutcome`] value.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{CarelinkError, Result};

/// The discharge report stored for one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DischargeReport {
    pub discharge_date: String,
    pub primary_diagnosis: String,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: String,
    #[serde(default)]
    pub follow_up: String,
    #[serde(default)]
    pub warning_signs: String,
    #[serde(default)]
    pub discharge_instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_reason: Option<String>,
    /// Lab name to most recent value, e.g. `creatinine`, `eGFR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_labs: Option<BTreeMap<String, f64>>,
}

/// A retrieved record tagged with the stored full name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_name: String,
    #[serde(flatten)]
    pub report: DischargeReport,
}

impl PatientRecord {
    /// Pretty JSON with `patient_name` first
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.patient_name.clone())
    }

    /// Parse a record out of free text that embeds one JSON object.
    ///
    /// Only text mentioning both `patient_name` and `discharge_date` is
    /// considered. Returns `None` on any parse failure.
    pub fn from_embedded_json(text: &str) -> Option<Self> {
        if !(text.contains("patient_name") && text.contains("discharge_date")) {
            return None;
        }
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end < start {
            return None;
        }
        serde_json::from_str(&text[start..=end]).ok()
    }
}

/// Result of a name lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found { record: PatientRecord },
    NotFound { query: String },
    Ambiguous { query: String, candidates: Vec<String> },
}

impl LookupOutcome {
    pub fn record(&self) -> Option<&PatientRecord> {
        match self {
            LookupOutcome::Found { record } => Some(record),
            _ => None,
        }
    }

    /// Render the outcome as text for the language model
    pub fn render(&self) -> String {
        match self {
            LookupOutcome::Found { record } => record.to_pretty_json(),
            LookupOutcome::NotFound { query } => format!(
                "ERROR: Patient '{}' not found in the database. Please check the spelling or confirm the patient's identity.",
                query
            ),
            LookupOutcome::Ambiguous { candidates, .. } => format!(
                "ERROR: Multiple patients found with similar names: {}. Please provide the full exact name.",
                candidates.join(", ")
            ),
        }
    }
}

/// Read-only store of discharge reports keyed by full name
#[derive(Debug, Clone, Default)]
pub struct PatientStore {
    records: BTreeMap<String, DischargeReport>,
}

impl PatientStore {
    pub fn new(records: BTreeMap<String, DischargeReport>) -> Self {
        Self { records }
    }

    /// Load the store from a JSON file mapping full name to report
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CarelinkError::data(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let records: BTreeMap<String, DischargeReport> = serde_json::from_str(content)
            .map_err(|e| CarelinkError::data(format!("Invalid patient data: {}", e)))?;
        Ok(Self::new(records))
    }

    /// Load the store, degrading to an empty store when the file is missing
    /// or unreadable. Every lookup then reports not found.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(store) => {
                tracing::info!(patients = store.len(), path = %path.display(), "patient store loaded");
                store
            }
            Err(e) => {
                tracing::warn!(error = %e, "patient store unavailable, all lookups will report not found");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find a patient by name.
    ///
    /// Case-insensitive. A single exact match wins outright; otherwise every
    /// stored name that contains the query, or is contained in it, is a
    /// candidate.
    pub fn find(&self, name: &str) -> LookupOutcome {
        let query = name.trim().to_lowercase();
        tracing::info!(query = name, "looking up patient record");

        if query.is_empty() {
            return LookupOutcome::NotFound {
                query: name.to_string(),
            };
        }

        let exact: Vec<&String> = self
            .records
            .keys()
            .filter(|stored| stored.to_lowercase() == query)
            .collect();

        let matches: Vec<&String> = if exact.is_empty() {
            self.records
                .keys()
                .filter(|stored| {
                    let stored = stored.to_lowercase();
                    stored.contains(&query) || query.contains(&stored)
                })
                .collect()
        } else {
            exact
        };

        match matches.as_slice() {
            [] => {
                tracing::warn!(query = name, "patient not found");
                LookupOutcome::NotFound {
                    query: name.to_string(),
                }
            }
            [only] => {
                tracing::info!(patient = %only, "patient record retrieved");
                LookupOutcome::Found {
                    record: PatientRecord {
                        patient_name: (*only).clone(),
                        report: self.records[*only].clone(),
                    },
                }
            }
            many => {
                tracing::warn!(query = name, candidates = many.len(), "ambiguous patient name");
                LookupOutcome::Ambiguous {
                    query: name.to_string(),
                    candidates: many.iter().map(|s| (*s).clone()).collect(),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_report(diagnosis: &str) -> DischargeReport {
    DischargeReport {
        discharge_date: "2024-03-02".to_string(),
        primary_diagnosis: diagnosis.to_string(),
        medications: vec!["Lisinopril 10mg daily".to_string()],
        dietary_restrictions: "Low sodium (2g/day)".to_string(),
        follow_up: "Nephrology clinic in 2 weeks".to_string(),
        warning_signs: "Swelling, shortness of breath".to_string(),
        discharge_instructions: "Monitor blood pressure daily".to_string(),
        age: Some(61),
        gender: Some("Female".to_string()),
        admission_reason: Some("Worsening kidney function".to_string()),
        recent_labs: Some(BTreeMap::from([
            ("creatinine".to_string(), 2.4),
            ("eGFR".to_string(), 38.0),
        ])),
    }
}

#[cfg(test)]
pub(crate) fn sample_store(names: &[&str]) -> PatientStore {
    PatientStore::new(
        names
            .iter()
            .map(|n| (n.to_string(), sample_report("Chronic Kidney Disease Stage 3a")))
            .collect(),
    )
}
