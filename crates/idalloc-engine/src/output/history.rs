//! History file writer
//!
//! Emits one tab-separated record per (descendant gene, change-type,
//! ancestor) triple: `allocated_gene_id \t change_type \t ancestor_source_id`,
//! with an empty ancestor field for genes that have none. Ancestors whose
//! `known_events` does not include the change-type are spurious index
//! overlaps and are skipped.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use idalloc_common::Result;
use tracing::debug;

use crate::collection::EventCollection;
use crate::ledger::Channel;
use crate::model::Provenance;

pub struct HistoryWriter;

impl HistoryWriter {
    /// Write history records for every not-yet-recorded descendant gene.
    /// Returns the number of records written; a second invocation against
    /// the same collection writes none.
    pub fn write_to(collection: &mut EventCollection, out: &mut dyn Write) -> Result<usize> {
        let (events, index, ledger) = collection.parts_mut();
        let mut written = 0;

        for event in events {
            for locus in &event.loci {
                for &gene_id in locus {
                    let gene = index.gene(gene_id);
                    if gene.provenance == Provenance::Reference {
                        continue;
                    }
                    let Some(allocated) = gene.allocated_id.as_deref() else {
                        continue;
                    };
                    if !ledger.mark(gene_id, Channel::History(event.event_type)) {
                        continue;
                    }

                    if gene.ancestors.is_empty() {
                        writeln!(out, "{}\t{}\t", allocated, event.event_type)?;
                        written += 1;
                    } else {
                        for &ancestor_id in &gene.ancestors {
                            let ancestor = index.gene(ancestor_id);
                            if ancestor.known_events.contains(&event.event_type) {
                                writeln!(
                                    out,
                                    "{}\t{}\t{}",
                                    allocated, event.event_type, ancestor.source_id
                                )?;
                                written += 1;
                            }
                        }
                    }
                }
            }
        }

        debug!(records = written, "Wrote history records");
        Ok(written)
    }

    /// Write history records to a file path
    pub fn write_file(collection: &mut EventCollection, path: impl AsRef<Path>) -> Result<usize> {
        let mut out = BufWriter::new(File::create(path)?);
        let written = Self::write_to(collection, &mut out)?;
        out.flush()?;
        Ok(written)
    }
}
