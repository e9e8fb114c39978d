//! Session/database writer
//!
//! Persists every gene that received an identifier in this run, together
//! with its transcripts, into the session store. Identifiers are grouped
//! under one session row per authority id-set, created on first use.

use idalloc_common::Result;
use tracing::debug;

use crate::collection::EventCollection;
use crate::ledger::Channel;
use crate::store::{FeatureType, SessionStore};

pub struct SessionWriter<'a> {
    store: &'a dyn SessionStore,
    application_id: i64,
    production_database_id: i64,
    message: String,
}

impl<'a> SessionWriter<'a> {
    pub fn new(
        store: &'a dyn SessionStore,
        application_id: i64,
        production_database_id: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            store,
            application_id,
            production_database_id,
            message: message.into(),
        }
    }

    /// Record every not-yet-persisted allocated gene and its transcripts.
    /// Returns the number of identifiers recorded; a second invocation
    /// against the same collection records none.
    pub async fn write(&self, collection: &mut EventCollection) -> Result<usize> {
        let (events, index, ledger) = collection.parts_mut();
        let mut recorded = 0;

        for event in events {
            for locus in &event.loci {
                for &gene_id in locus {
                    let gene = index.gene(gene_id);
                    let Some(allocated) = gene.allocated_id.as_deref() else {
                        continue;
                    };
                    // Only genes allocated in this run carry an id-set token.
                    let Some(id_set) = gene.id_set else {
                        continue;
                    };
                    if !ledger.mark(gene_id, Channel::Session) {
                        continue;
                    }

                    let session_id = match self.store.session_for_id_set(id_set).await? {
                        Some(session_id) => session_id,
                        None => {
                            self.store
                                .create_session(
                                    self.application_id,
                                    self.production_database_id,
                                    id_set,
                                    &self.message,
                                )
                                .await?
                        },
                    };

                    self.store
                        .record_identifier(session_id, allocated, FeatureType::Gene)
                        .await?;
                    recorded += 1;

                    for transcript in &gene.transcripts {
                        if let Some(transcript_id) = transcript.allocated_id.as_deref() {
                            self.store
                                .record_identifier(session_id, transcript_id, FeatureType::Transcript)
                                .await?;
                            recorded += 1;
                        }
                    }
                }
            }
        }

        debug!(recorded, "Wrote session records");
        Ok(recorded)
    }
}
