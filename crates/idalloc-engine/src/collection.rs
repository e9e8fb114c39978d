//! Event collection: one allocation pass per change-type
//!
//! The collection owns the shared feature index, runs build, allocation,
//! and provenance resolution for every recognized change-type, and exposes
//! the identifier lookup the output consumers run on. Construction
//! completes fully before any consumer reads allocated identifiers; there
//! is no partial-result guarantee mid-construction.

use idalloc_common::Result;
use tracing::info;

use crate::event::{AnnotationEvent, EventType};
use crate::feature::{CollisionMode, FeatureIndex};
use crate::ledger::OutputLedger;
use crate::osid::IdAuthority;
use crate::source::EventSource;

#[derive(Debug)]
pub struct EventCollection {
    organism: String,
    index: FeatureIndex,
    events: Vec<AnnotationEvent>,
    ledger: OutputLedger,
}

impl EventCollection {
    /// Drive the full reconciliation: for each change-type, pull the raw
    /// loci from the event source, build the feature-graph fragments,
    /// run the allocation protocol, and resolve provenance.
    ///
    /// Change-types are processed strictly sequentially; they share the one
    /// mutable index and the one authority session.
    pub async fn create(
        organism: &str,
        source: &dyn EventSource,
        authority: &dyn IdAuthority,
        mode: CollisionMode,
    ) -> Result<Self> {
        let organism_id = authority.organism_id(organism).await?;

        let mut index = FeatureIndex::new(mode);
        let mut events = Vec::with_capacity(EventType::ALL.len());

        for event_type in EventType::ALL {
            let raw_events = source.events_for(event_type).await?;
            let mut event = AnnotationEvent::build(event_type, raw_events, &mut index)?;
            event.allocate(&mut index, authority, organism_id).await?;
            event.resolve_ancestors(&mut index);

            info!(
                event_type = %event_type,
                loci = event.loci.len(),
                new_genes = event.new_gene_count,
                "Processed change-type"
            );
            events.push(event);
        }

        Ok(Self {
            organism: organism.to_string(),
            index,
            events,
            ledger: OutputLedger::new(),
        })
    }

    /// Allocated identifier for a source id, or `None` when the feature is
    /// unknown or never received one.
    pub fn allocated_id_for(&self, source_id: &str) -> Option<&str> {
        self.index.allocated_id_for(source_id)
    }

    pub fn organism(&self) -> &str {
        &self.organism
    }

    pub fn events(&self) -> &[AnnotationEvent] {
        &self.events
    }

    pub fn index(&self) -> &FeatureIndex {
        &self.index
    }

    /// Disjoint borrows for output consumers: the events and index are read,
    /// the ledger is written.
    pub(crate) fn parts_mut(&mut self) -> (&[AnnotationEvent], &FeatureIndex, &mut OutputLedger) {
        (&self.events, &self.index, &mut self.ledger)
    }
}
