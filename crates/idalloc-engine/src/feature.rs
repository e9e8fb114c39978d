//! Feature graph: typed nodes and the global source-id index
//!
//! All features constructed during a run live in one arena owned by
//! [`FeatureIndex`]. Genes own their transcripts, transcripts own exactly
//! one coding sequence, and every node is registered into the flat
//! `source_id` lookup as a side effect of construction. Nodes are never
//! removed; the whole index is dropped at the end of the run.

use std::collections::{HashMap, HashSet};

use idalloc_common::{AllocError, Result};
use tracing::warn;

use crate::event::EventType;
use crate::model::{GeneModel, Provenance};

/// Stable handle to a gene in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeneId(pub(crate) usize);

/// Address of any feature reachable from the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKey {
    Gene(GeneId),
    /// Transcript `n` of a gene
    Transcript(GeneId, usize),
    /// Coding sequence of transcript `n` of a gene
    Cds(GeneId, usize),
}

/// Leaf node: the single coding sequence of a transcript
#[derive(Debug, Clone)]
pub struct CodingSequence {
    pub source_id: String,
    pub allocated_id: Option<String>,
}

/// A transcript belongs to one gene and owns one coding sequence
#[derive(Debug, Clone)]
pub struct Transcript {
    pub source_id: String,
    pub version: Option<i32>,
    pub allocated_id: Option<String>,
    pub cds: CodingSequence,
}

/// A gene is an ordered collection of transcripts
#[derive(Debug, Clone)]
pub struct Gene {
    pub source_id: String,
    pub version: Option<i32>,
    pub provenance: Provenance,
    /// Identifier assigned by the authority; set at most once per run
    pub allocated_id: Option<String>,
    /// Batch token of the authority id-set this gene was allocated under
    pub id_set: Option<i64>,
    /// Reference genes of this gene's locus, filled by the provenance resolver
    pub ancestors: Vec<GeneId>,
    /// Change-types this gene legitimately participates in
    pub known_events: HashSet<EventType>,
    pub transcripts: Vec<Transcript>,
}

impl Gene {
    /// Fan an authority response down through the transcripts, positionally.
    ///
    /// The response arrays must line up with the gene's transcript sequence;
    /// a length mismatch is a failed update, not retried.
    pub fn apply_transcript_ids(&mut self, transcripts: &[String], proteins: &[String]) -> Result<()> {
        if transcripts.len() != self.transcripts.len() || proteins.len() != self.transcripts.len() {
            return Err(AllocError::StructuralMismatch {
                gene: self.source_id.clone(),
                expected: self.transcripts.len(),
                received: transcripts.len().min(proteins.len()),
            });
        }

        for (transcript, (new_id, protein_id)) in self
            .transcripts
            .iter_mut()
            .zip(transcripts.iter().zip(proteins.iter()))
        {
            transcript.allocated_id = Some(new_id.clone());
            transcript.cds.allocated_id = Some(protein_id.clone());
        }

        Ok(())
    }
}

/// How the index reacts when a source id is registered twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionMode {
    /// Fail the run with a diagnosable error (default, used in tests)
    #[default]
    Reject,
    /// Last write wins, with a warning per collision (production parity
    /// with the historic behaviour of the upstream pipeline)
    Overwrite,
}

/// Arena of all features plus the flat `source_id` lookup shared across
/// every change-type of the run.
#[derive(Debug, Default)]
pub struct FeatureIndex {
    genes: Vec<Gene>,
    lookup: HashMap<String, FeatureKey>,
    mode: CollisionMode,
}

impl FeatureIndex {
    pub fn new(mode: CollisionMode) -> Self {
        Self {
            genes: Vec::new(),
            lookup: HashMap::new(),
            mode,
        }
    }

    /// Construct a gene (with its transcripts and coding sequences) from a
    /// nested model record, registering every node by `source_id`.
    ///
    /// The coding sequence has no identifier of its own in the event tables;
    /// it is addressed as `<transcript_id>-CDS`, matching the convention the
    /// GFF rewriter uses to resolve CDS lines.
    pub fn insert_gene(&mut self, model: GeneModel, event_type: EventType) -> Result<GeneId> {
        let gene_id = GeneId(self.genes.len());

        let transcripts = model
            .transcripts
            .into_iter()
            .map(|t| Transcript {
                cds: CodingSequence {
                    source_id: format!("{}-CDS", t.id),
                    allocated_id: None,
                },
                source_id: t.id,
                version: t.version,
                allocated_id: None,
            })
            .collect::<Vec<_>>();

        let mut known_events = HashSet::new();
        known_events.insert(event_type);

        let gene = Gene {
            source_id: model.id,
            version: model.version,
            provenance: model.provenance,
            allocated_id: None,
            id_set: None,
            ancestors: Vec::new(),
            known_events,
            transcripts,
        };

        self.register(gene.source_id.clone(), FeatureKey::Gene(gene_id))?;
        for (n, transcript) in gene.transcripts.iter().enumerate() {
            self.register(
                transcript.source_id.clone(),
                FeatureKey::Transcript(gene_id, n),
            )?;
            self.register(transcript.cds.source_id.clone(), FeatureKey::Cds(gene_id, n))?;
        }

        self.genes.push(gene);
        Ok(gene_id)
    }

    fn register(&mut self, source_id: String, key: FeatureKey) -> Result<()> {
        match self.lookup.insert(source_id.clone(), key) {
            Some(previous) => match self.mode {
                CollisionMode::Reject => {
                    // Restore nothing: the run aborts here anyway.
                    Err(AllocError::DuplicateSourceId(source_id))
                },
                CollisionMode::Overwrite => {
                    warn!(
                        source_id = %source_id,
                        previous = ?previous,
                        "Source id registered twice; keeping the newer feature"
                    );
                    Ok(())
                },
            },
            None => Ok(()),
        }
    }

    pub fn gene(&self, id: GeneId) -> &Gene {
        &self.genes[id.0]
    }

    pub fn gene_mut(&mut self, id: GeneId) -> &mut Gene {
        &mut self.genes[id.0]
    }

    /// Look up any feature by source id
    pub fn get(&self, source_id: &str) -> Option<FeatureKey> {
        self.lookup.get(source_id).copied()
    }

    /// Allocated identifier for a source id, across all feature levels.
    ///
    /// Absent entries and features that never received an identifier both
    /// yield `None`; callers treat that as "no rewrite applicable".
    pub fn allocated_id_for(&self, source_id: &str) -> Option<&str> {
        match self.lookup.get(source_id)? {
            FeatureKey::Gene(g) => self.genes[g.0].allocated_id.as_deref(),
            FeatureKey::Transcript(g, n) => self.genes[g.0].transcripts[*n].allocated_id.as_deref(),
            FeatureKey::Cds(g, n) => self.genes[g.0].transcripts[*n].cds.allocated_id.as_deref(),
        }
    }

    /// Number of registered source ids
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::TranscriptModel;

    fn gene_model(id: &str, provenance: Provenance) -> GeneModel {
        GeneModel {
            provenance,
            id: id.to_string(),
            version: Some(1),
            transcripts: vec![TranscriptModel::new(format!("{id}_R0001"))],
        }
    }

    #[test]
    fn construction_registers_all_levels() {
        let mut index = FeatureIndex::new(CollisionMode::Reject);
        let id = index
            .insert_gene(gene_model("ABCD00001", Provenance::Reference), EventType::MergeGene)
            .unwrap();

        let gene = index.gene(id);
        assert_eq!(gene.source_id, "ABCD00001");
        assert_eq!(gene.transcripts.len(), 1);
        assert_eq!(gene.transcripts[0].source_id, "ABCD00001_R0001");
        assert_eq!(gene.transcripts[0].cds.source_id, "ABCD00001_R0001-CDS");

        // Gene, transcript, and CDS all reachable through the flat lookup.
        assert_eq!(index.len(), 3);
        assert!(matches!(index.get("ABCD00001"), Some(FeatureKey::Gene(_))));
        assert!(matches!(
            index.get("ABCD00001_R0001-CDS"),
            Some(FeatureKey::Cds(_, 0))
        ));
    }

    #[test]
    fn reject_mode_surfaces_collisions() {
        let mut index = FeatureIndex::new(CollisionMode::Reject);
        index
            .insert_gene(gene_model("ABCD00001", Provenance::Reference), EventType::SplitGene)
            .unwrap();
        let err = index
            .insert_gene(gene_model("ABCD00001", Provenance::Incoming), EventType::MergeGene)
            .unwrap_err();

        assert!(matches!(err, AllocError::DuplicateSourceId(id) if id == "ABCD00001"));
    }

    #[test]
    fn overwrite_mode_keeps_the_newer_feature() {
        let mut index = FeatureIndex::new(CollisionMode::Overwrite);
        index
            .insert_gene(gene_model("ABCD00001", Provenance::Reference), EventType::SplitGene)
            .unwrap();
        let second = index
            .insert_gene(gene_model("ABCD00001", Provenance::Incoming), EventType::MergeGene)
            .unwrap();

        match index.get("ABCD00001") {
            Some(FeatureKey::Gene(g)) => assert_eq!(g, second),
            other => panic!("unexpected lookup result: {other:?}"),
        }
        assert_eq!(index.gene(second).provenance, Provenance::Incoming);
    }

    #[test]
    fn transcript_fanout_is_positional() {
        let mut index = FeatureIndex::new(CollisionMode::Reject);
        let model = GeneModel {
            provenance: Provenance::Incoming,
            id: "GENE1".to_string(),
            version: Some(1),
            transcripts: vec![TranscriptModel::new("T1"), TranscriptModel::new("T2")],
        };
        let id = index.insert_gene(model, EventType::NewGene).unwrap();

        index
            .gene_mut(id)
            .apply_transcript_ids(
                &["N_R001".to_string(), "N_R002".to_string()],
                &["N_P001".to_string(), "N_P002".to_string()],
            )
            .unwrap();

        assert_eq!(index.allocated_id_for("T1"), Some("N_R001"));
        assert_eq!(index.allocated_id_for("T2"), Some("N_R002"));
        assert_eq!(index.allocated_id_for("T2-CDS"), Some("N_P002"));
    }

    #[test]
    fn transcript_fanout_rejects_length_mismatch() {
        let mut index = FeatureIndex::new(CollisionMode::Reject);
        let id = index
            .insert_gene(gene_model("GENE2", Provenance::Incoming), EventType::NewGene)
            .unwrap();

        let err = index
            .gene_mut(id)
            .apply_transcript_ids(
                &["N_R001".to_string(), "N_R002".to_string()],
                &["N_P001".to_string(), "N_P002".to_string()],
            )
            .unwrap_err();

        assert!(matches!(
            err,
            AllocError::StructuralMismatch { expected: 1, received: 2, .. }
        ));
    }
}
