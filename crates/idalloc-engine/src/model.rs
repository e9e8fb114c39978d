//! Raw gene-model records as delivered by an event source
//!
//! A locus is the full list of gene models (reference and incoming)
//! considered together for one genomic location change. These records are
//! the only input shape the feature graph is built from.

use serde::{Deserialize, Serialize};

/// Where a gene model came from within one curation round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Carried over from the prior annotation round
    Reference,
    /// Produced by the current curation round; needs identifier allocation
    Incoming,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Reference => "reference",
            Provenance::Incoming => "incoming",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One transcript record inside a gene model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptModel {
    pub id: String,
    #[serde(default)]
    pub version: Option<i32>,
}

impl TranscriptModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
        }
    }
}

/// One nested gene model record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneModel {
    pub provenance: Provenance,
    pub id: String,
    #[serde(default)]
    pub version: Option<i32>,
    pub transcripts: Vec<TranscriptModel>,
}

impl GeneModel {
    /// A reference gene model with no version, as the event tables deliver it
    pub fn reference(id: impl Into<String>, transcripts: Vec<TranscriptModel>) -> Self {
        Self {
            provenance: Provenance::Reference,
            id: id.into(),
            version: None,
            transcripts,
        }
    }

    /// An incoming gene model at version 1
    pub fn incoming(id: impl Into<String>, transcripts: Vec<TranscriptModel>) -> Self {
        Self {
            provenance: Provenance::Incoming,
            id: id.into(),
            version: Some(1),
            transcripts,
        }
    }
}

/// All gene models grouped at one genomic location change
pub type Locus = Vec<GeneModel>;
