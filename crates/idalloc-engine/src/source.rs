//! Annotation event sources
//!
//! The curation database records one row per locus change in `gene_events`,
//! with the reference gene id(s) in `vb_gene_id` and the incoming gene
//! id(s) in `cap_gene_id`. Split and merge rows pack their multi-gene side
//! into a single `:`-separated column. Transcript membership comes from
//! `gene_model`.
//!
//! A brand new organism has no curation history; its annotation file is the
//! event source instead, and every observed gene is a `new_gene` event.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use async_trait::async_trait;
use idalloc_common::Result;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::event::EventType;
use crate::model::{GeneModel, Locus, TranscriptModel};

/// A source of grouped gene-model records per change-type
#[async_trait]
pub trait EventSource: Send + Sync {
    /// All loci recorded for one change-type
    async fn events_for(&self, event_type: EventType) -> Result<Vec<Locus>>;
}

/// Event source backed by the curation database
pub struct DbEventSource {
    pool: PgPool,
}

impl DbEventSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn transcripts_of(&self, gene_id: &str) -> Result<Vec<TranscriptModel>> {
        let rows = sqlx::query("SELECT DISTINCT transcript_id FROM gene_model WHERE gene_id = $1")
            .bind(gene_id)
            .fetch_all(&self.pool)
            .await?;

        let mut transcripts = Vec::with_capacity(rows.len());
        for row in rows {
            let transcript_id: String = row.try_get("transcript_id")?;
            transcripts.push(TranscriptModel::new(transcript_id));
        }
        Ok(transcripts)
    }

    async fn reference_model(&self, gene_id: &str) -> Result<GeneModel> {
        Ok(GeneModel::reference(gene_id, self.transcripts_of(gene_id).await?))
    }

    async fn incoming_model(&self, gene_id: &str) -> Result<GeneModel> {
        Ok(GeneModel::incoming(gene_id, self.transcripts_of(gene_id).await?))
    }
}

#[async_trait]
impl EventSource for DbEventSource {
    async fn events_for(&self, event_type: EventType) -> Result<Vec<Locus>> {
        let rows = sqlx::query("SELECT vb_gene_id, cap_gene_id FROM gene_events WHERE events = $1")
            .bind(event_type.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let reference_column: String = row.try_get("vb_gene_id")?;
            let incoming_column: String = row.try_get("cap_gene_id")?;

            let mut locus: Locus = Vec::new();
            match event_type {
                EventType::NewGene => {
                    locus.push(self.incoming_model(&incoming_column).await?);
                },
                EventType::ChangeGene => {
                    let mut reference = self.reference_model(&reference_column).await?;
                    reference.version = None;
                    let mut incoming = self.incoming_model(&incoming_column).await?;
                    incoming.version = None;
                    locus.push(reference);
                    locus.push(incoming);
                },
                EventType::SplitGene => {
                    locus.push(self.reference_model(&reference_column).await?);
                    for gene_id in incoming_column.split(':') {
                        locus.push(self.incoming_model(gene_id).await?);
                    }
                },
                EventType::MergeGene => {
                    locus.push(self.incoming_model(&incoming_column).await?);
                    for gene_id in reference_column.split(':') {
                        locus.push(self.reference_model(gene_id).await?);
                    }
                },
            }
            events.push(locus);
        }

        debug!(event_type = %event_type, loci = events.len(), "Fetched annotation events");
        Ok(events)
    }
}

/// Event source reading an annotation file directly, for seeding a brand
/// new organism. Every gene-level feature of an observed type becomes an
/// incoming gene; all genes of one observed type form one locus.
pub struct GffEventSource {
    loci: Vec<Locus>,
}

impl GffEventSource {
    /// Gene-level feature types observed by default
    pub const DEFAULT_GENE_TYPES: [&'static str; 3] = ["gene", "ncRNA_gene", "pseudogene"];

    pub fn from_file(path: impl AsRef<Path>, gene_types: &[&str]) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        Self::from_reader(reader, gene_types)
    }

    pub fn from_reader(reader: impl BufRead, gene_types: &[&str]) -> Result<Self> {
        let mut groups: Vec<Vec<GeneModel>> = vec![Vec::new(); gene_types.len()];
        let mut gene_of: HashMap<String, (usize, usize)> = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            let fields: Vec<&str> = line.trim_end().split('\t').collect();
            if fields.len() != 9 {
                continue;
            }

            let attributes = parse_attributes(fields[8]);
            let id = attributes.get("ID");
            let parent = attributes.get("Parent");

            if let Some(group) = gene_types.iter().position(|t| *t == fields[2]) {
                if let Some(id) = id {
                    gene_of.insert(id.clone(), (group, groups[group].len()));
                    groups[group].push(GeneModel::incoming(id.clone(), Vec::new()));
                }
            } else if let (Some(id), Some(parent)) = (id, parent) {
                // Direct children of an observed gene are its transcripts.
                // Deeper features (CDS, exon) parent onto a transcript and
                // get their identifiers derived during allocation.
                if let Some(&(group, gene)) = gene_of.get(parent) {
                    groups[group][gene]
                        .transcripts
                        .push(TranscriptModel::new(id.clone()));
                }
            }
        }

        let loci: Vec<Locus> = groups.into_iter().filter(|g| !g.is_empty()).collect();
        debug!(
            loci = loci.len(),
            genes = loci.iter().map(Vec::len).sum::<usize>(),
            "Loaded annotation events from file"
        );
        Ok(Self { loci })
    }
}

#[async_trait]
impl EventSource for GffEventSource {
    async fn events_for(&self, event_type: EventType) -> Result<Vec<Locus>> {
        match event_type {
            EventType::NewGene => Ok(self.loci.clone()),
            _ => Ok(Vec::new()),
        }
    }
}

/// Parse the `key=value` pairs of a GFF attribute column
fn parse_attributes(attribute_column: &str) -> HashMap<String, String> {
    attribute_column
        .split(';')
        .filter(|field| !field.is_empty())
        .filter_map(|field| {
            field
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::Provenance;

    const SAMPLE: &str = "\
##gff-version 3
KB704696\tVectorBase\tgene\t1\t100\t.\t+\t.\tID=G1;
KB704696\tVectorBase\tmRNA\t1\t100\t.\t+\t.\tID=G1_T1;Parent=G1;
KB704696\tVectorBase\tCDS\t1\t50\t.\t+\t0\tParent=G1_T1;ID=cds1;
KB704696\tVectorBase\tncRNA_gene\t1\t100\t.\t+\t.\tID=N1;
KB704696\tVectorBase\tncRNA\t1\t100\t.\t+\t.\tID=N1_T1;Parent=N1;
KB704696\tVectorBase\tgene\t200\t300\t.\t-\t.\tID=G2;
KB704696\tVectorBase\tmRNA\t200\t300\t.\t-\t.\tID=G2_T1;Parent=G2;
";

    #[tokio::test]
    async fn every_observed_gene_becomes_an_incoming_new_gene() {
        let source = GffEventSource::from_reader(
            SAMPLE.as_bytes(),
            &GffEventSource::DEFAULT_GENE_TYPES,
        )
        .unwrap();

        let loci = source.events_for(EventType::NewGene).await.unwrap();
        // One locus per observed type with genes; no pseudogenes here.
        assert_eq!(loci.len(), 2);
        assert_eq!(loci[0].len(), 2);
        assert_eq!(loci[0][0].id, "G1");
        assert_eq!(loci[0][0].provenance, Provenance::Incoming);
        assert_eq!(loci[0][1].id, "G2");
        assert_eq!(loci[1][0].id, "N1");
    }

    #[tokio::test]
    async fn transcripts_attach_to_their_gene_but_cds_lines_do_not() {
        let source = GffEventSource::from_reader(
            SAMPLE.as_bytes(),
            &GffEventSource::DEFAULT_GENE_TYPES,
        )
        .unwrap();

        let loci = source.events_for(EventType::NewGene).await.unwrap();
        let g1 = &loci[0][0];
        assert_eq!(g1.transcripts.len(), 1);
        assert_eq!(g1.transcripts[0].id, "G1_T1");
        let n1 = &loci[1][0];
        assert_eq!(n1.transcripts[0].id, "N1_T1");
    }

    #[tokio::test]
    async fn only_the_new_gene_change_type_yields_events() {
        let source = GffEventSource::from_reader(
            SAMPLE.as_bytes(),
            &GffEventSource::DEFAULT_GENE_TYPES,
        )
        .unwrap();

        for event_type in [EventType::ChangeGene, EventType::SplitGene, EventType::MergeGene] {
            assert!(source.events_for(event_type).await.unwrap().is_empty());
        }
    }
}
