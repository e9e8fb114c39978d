//! Annotation events: one allocation pass per change-type
//!
//! An event is a change to a locus with one or more overlapping genes.
//! Each change-type is processed as one [`AnnotationEvent`]: the builder
//! materializes feature-graph fragments from raw loci, the allocation step
//! talks to the identifier authority, and the provenance resolver links
//! descendants back to the reference genes they replace.

use std::collections::HashMap;

use anyhow::anyhow;
use idalloc_common::{AllocError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::feature::{FeatureIndex, GeneId};
use crate::model::{Locus, Provenance};
use crate::osid::{IdAuthority, TranscriptPatch};

/// Recognized locus-level change-types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NewGene,
    ChangeGene,
    SplitGene,
    MergeGene,
}

impl EventType {
    /// Every change-type, in the order the collection processes them
    pub const ALL: [EventType; 4] = [
        EventType::NewGene,
        EventType::ChangeGene,
        EventType::SplitGene,
        EventType::MergeGene,
    ];

    /// Tag used in the event tables and the history file
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NewGene => "new_gene",
            EventType::ChangeGene => "change_gene",
            EventType::SplitGene => "split_gene",
            EventType::MergeGene => "merge_gene",
        }
    }

    /// Which allocation protocol this change-type uses
    pub fn strategy(&self) -> AllocationStrategy {
        match self {
            EventType::ChangeGene => AllocationStrategy::ReuseOnEdit,
            _ => AllocationStrategy::BatchCreate,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The two mutually exclusive allocation protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// Request a batch of brand-new gene identifiers and assign them FIFO
    BatchCreate,
    /// Edited genes keep their reference sibling's identifier
    ReuseOnEdit,
}

/// All loci of one change-type, with the bookkeeping the allocation
/// protocols need.
#[derive(Debug)]
pub struct AnnotationEvent {
    pub event_type: EventType,
    /// Genes per locus, in construction order
    pub loci: Vec<Vec<GeneId>>,
    /// Incoming genes in construction order; FIFO allocation order
    created: Vec<GeneId>,
    /// Locus membership by gene source id, for sibling lookups
    locus_of: HashMap<String, usize>,
    /// Incoming gene models seen while building, i.e. identifiers needed
    pub new_gene_count: usize,
}

impl AnnotationEvent {
    /// Materialize feature-graph fragments for every locus of one
    /// change-type. This is the only path by which features become visible
    /// to consumers.
    pub fn build(
        event_type: EventType,
        raw_events: Vec<Locus>,
        index: &mut FeatureIndex,
    ) -> Result<Self> {
        let mut event = Self {
            event_type,
            loci: Vec::with_capacity(raw_events.len()),
            created: Vec::new(),
            locus_of: HashMap::new(),
            new_gene_count: 0,
        };

        for locus in raw_events {
            let locus_number = event.loci.len();
            let mut genes = Vec::with_capacity(locus.len());

            for model in locus {
                let incoming = model.provenance != Provenance::Reference;
                let gene_id = index.insert_gene(model, event_type)?;

                event
                    .locus_of
                    .insert(index.gene(gene_id).source_id.clone(), locus_number);
                if incoming {
                    event.new_gene_count += 1;
                    event.created.push(gene_id);
                }
                genes.push(gene_id);
            }

            event.loci.push(genes);
        }

        debug!(
            event_type = %event_type,
            loci = event.loci.len(),
            new_genes = event.new_gene_count,
            "Built annotation event"
        );
        Ok(event)
    }

    /// Run the allocation protocol for this change-type.
    ///
    /// Any authority failure aborts the pass; identifiers already assigned
    /// in this run are not rolled back.
    pub async fn allocate(
        &mut self,
        index: &mut FeatureIndex,
        authority: &dyn IdAuthority,
        organism_id: i64,
    ) -> Result<()> {
        match self.event_type.strategy() {
            AllocationStrategy::BatchCreate => self.allocate_batch(index, authority, organism_id).await,
            AllocationStrategy::ReuseOnEdit => self.allocate_reuse(index, authority, organism_id).await,
        }
    }

    /// Batch-create protocol: one id-set request for every new gene of the
    /// change-type, assigned to incoming genes strictly in construction
    /// order, then one transcript-patch call fanning identifiers down.
    async fn allocate_batch(
        &mut self,
        index: &mut FeatureIndex,
        authority: &dyn IdAuthority,
        organism_id: i64,
    ) -> Result<()> {
        let set = authority.allocate_genes(organism_id, self.new_gene_count).await?;
        if set.gene_ids.len() != self.new_gene_count {
            return Err(AllocError::AllocationCount {
                requested: self.new_gene_count,
                received: set.gene_ids.len(),
            });
        }

        let mut patch = Vec::with_capacity(self.created.len());
        let mut by_allocated: HashMap<String, GeneId> = HashMap::new();

        // Strict FIFO match: the first unassigned incoming gene takes the
        // first generated identifier, and so on.
        for (&gene_id, new_id) in self.created.iter().zip(set.gene_ids) {
            let gene = index.gene_mut(gene_id);
            gene.id_set = Some(set.set_id);
            gene.allocated_id = Some(new_id.clone());
            patch.push(TranscriptPatch {
                gene_id: new_id.clone(),
                transcripts: gene.transcripts.len(),
            });
            by_allocated.insert(new_id, gene_id);
        }

        if patch.is_empty() {
            return Ok(());
        }

        let allocated = authority.allocate_transcripts(set.set_id, &patch).await?;
        for entry in allocated {
            let gene_id = by_allocated.get(&entry.gene_id).copied().ok_or_else(|| {
                anyhow!(
                    "identifier authority returned unknown gene id '{}' in a transcript patch response",
                    entry.gene_id
                )
            })?;
            index
                .gene_mut(gene_id)
                .apply_transcript_ids(&entry.transcripts, &entry.proteins)?;
        }

        info!(
            event_type = %self.event_type,
            genes = self.created.len(),
            id_set = set.set_id,
            "Allocated new gene identifiers"
        );
        Ok(())
    }

    /// Reuse-on-edit protocol: an edited gene keeps its reference sibling's
    /// identifier; only transcript identifiers come from the authority,
    /// one gene at a time.
    async fn allocate_reuse(
        &mut self,
        index: &mut FeatureIndex,
        authority: &dyn IdAuthority,
        organism_id: i64,
    ) -> Result<()> {
        // Zero-gene request; only the id-set token is needed to group the
        // transcript-patch calls.
        let set = authority.allocate_genes(organism_id, 0).await?;

        for &gene_id in &self.created {
            let source_id = index.gene(gene_id).source_id.clone();
            let locus_number = self
                .locus_of
                .get(&source_id)
                .copied()
                .ok_or_else(|| AllocError::MissingReference(source_id.clone()))?;

            let sibling = self.loci[locus_number]
                .iter()
                .copied()
                .filter(|&g| index.gene(g).provenance == Provenance::Reference)
                .last()
                .ok_or_else(|| AllocError::MissingReference(source_id.clone()))?;
            let reused = index.gene(sibling).source_id.clone();

            let gene = index.gene_mut(gene_id);
            gene.id_set = Some(set.set_id);
            gene.allocated_id = Some(reused.clone());
            let patch = [TranscriptPatch {
                gene_id: reused,
                transcripts: gene.transcripts.len(),
            }];

            let allocated = authority.allocate_transcripts(set.set_id, &patch).await?;
            let entry = allocated.first().ok_or(AllocError::AllocationCount {
                requested: 1,
                received: 0,
            })?;
            index
                .gene_mut(gene_id)
                .apply_transcript_ids(&entry.transcripts, &entry.proteins)?;
        }

        info!(
            event_type = %self.event_type,
            genes = self.created.len(),
            id_set = set.set_id,
            "Reused identifiers for edited genes"
        );
        Ok(())
    }

    /// Partition each locus into ancestors (reference provenance) and
    /// descendants, assigning the entire ancestor set to every descendant.
    /// Splits and merges are both expressed by this all-to-all assignment;
    /// new-gene loci yield empty ancestor sets.
    pub fn resolve_ancestors(&self, index: &mut FeatureIndex) {
        for locus in &self.loci {
            let ancestors: Vec<GeneId> = locus
                .iter()
                .copied()
                .filter(|&g| index.gene(g).provenance == Provenance::Reference)
                .collect();

            for &gene_id in locus {
                if index.gene(gene_id).provenance != Provenance::Reference {
                    index.gene_mut(gene_id).ancestors = ancestors.clone();
                }
            }
        }
    }

    /// Incoming genes of this change-type, in construction order
    pub fn created(&self) -> &[GeneId] {
        &self.created
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::feature::CollisionMode;
    use crate::model::{GeneModel, TranscriptModel};

    fn model(id: &str, provenance: Provenance) -> GeneModel {
        GeneModel {
            provenance,
            id: id.to_string(),
            version: Some(1),
            transcripts: vec![TranscriptModel::new(format!("{id}_R0001"))],
        }
    }

    fn merge_locus() -> Locus {
        vec![
            model("ABCD00001", Provenance::Reference),
            model("ABCD00002", Provenance::Reference),
            model("DFGVE-DHETE", Provenance::Incoming),
        ]
    }

    #[test]
    fn strategy_dispatch() {
        assert_eq!(EventType::NewGene.strategy(), AllocationStrategy::BatchCreate);
        assert_eq!(EventType::SplitGene.strategy(), AllocationStrategy::BatchCreate);
        assert_eq!(EventType::MergeGene.strategy(), AllocationStrategy::BatchCreate);
        assert_eq!(EventType::ChangeGene.strategy(), AllocationStrategy::ReuseOnEdit);
    }

    #[test]
    fn build_counts_incoming_genes_only() {
        let mut index = FeatureIndex::new(CollisionMode::Reject);
        let second_locus = vec![
            model("ABCD00007", Provenance::Reference),
            model("ABCD00008", Provenance::Incoming),
            model("ABCD00009", Provenance::Incoming),
        ];

        let event = AnnotationEvent::build(
            EventType::MergeGene,
            vec![merge_locus(), second_locus],
            &mut index,
        )
        .unwrap();

        assert_eq!(event.loci.len(), 2);
        assert_eq!(event.new_gene_count, 3);
        assert_eq!(event.created().len(), 3);
        // Three genes per locus, each with a transcript and a CDS.
        assert_eq!(index.len(), 18);
        assert_eq!(index.gene(event.loci[0][0]).provenance, Provenance::Reference);
    }

    #[test]
    fn build_tags_known_events() {
        let mut index = FeatureIndex::new(CollisionMode::Reject);
        let event =
            AnnotationEvent::build(EventType::MergeGene, vec![merge_locus()], &mut index).unwrap();

        for &gene_id in &event.loci[0] {
            assert!(index.gene(gene_id).known_events.contains(&EventType::MergeGene));
        }
    }

    #[test]
    fn merge_locus_gets_all_ancestors() {
        let mut index = FeatureIndex::new(CollisionMode::Reject);
        let event =
            AnnotationEvent::build(EventType::MergeGene, vec![merge_locus()], &mut index).unwrap();

        event.resolve_ancestors(&mut index);

        let descendant = index.gene(event.loci[0][2]);
        let ancestor_ids: Vec<&str> = descendant
            .ancestors
            .iter()
            .map(|&a| index.gene(a).source_id.as_str())
            .collect();
        assert_eq!(ancestor_ids, vec!["ABCD00001", "ABCD00002"]);
    }

    #[test]
    fn split_descendants_share_the_single_ancestor() {
        let mut index = FeatureIndex::new(CollisionMode::Reject);
        let locus = vec![
            model("ABCD00001", Provenance::Reference),
            model("SPLIT-A", Provenance::Incoming),
            model("SPLIT-B", Provenance::Incoming),
        ];
        let event =
            AnnotationEvent::build(EventType::SplitGene, vec![locus], &mut index).unwrap();

        event.resolve_ancestors(&mut index);

        for &gene_id in &event.loci[0][1..] {
            let gene = index.gene(gene_id);
            assert_eq!(gene.ancestors.len(), 1);
            assert_eq!(index.gene(gene.ancestors[0]).source_id, "ABCD00001");
        }
    }

    #[test]
    fn new_gene_locus_has_no_ancestors() {
        let mut index = FeatureIndex::new(CollisionMode::Reject);
        let locus = vec![model("BRAND-NEW", Provenance::Incoming)];
        let event = AnnotationEvent::build(EventType::NewGene, vec![locus], &mut index).unwrap();

        event.resolve_ancestors(&mut index);

        assert!(index.gene(event.loci[0][0]).ancestors.is_empty());
    }
}
