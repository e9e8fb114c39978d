//! Per-(feature, channel) idempotence ledger
//!
//! Output consumers may run any number of times against the same event
//! collection; the ledger records which gene has already been emitted on
//! which channel so repeated invocations never duplicate records. The
//! ledger is bookkeeping about outputs, deliberately kept off the graph
//! nodes themselves.

use std::collections::HashSet;

use crate::event::EventType;
use crate::feature::GeneId;

/// An output channel a gene can be recorded on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// The history file, one flag per change-type
    History(EventType),
    /// The session/database store
    Session,
}

/// Tracks which (gene, channel) pairs have already been written
#[derive(Debug, Default)]
pub struct OutputLedger {
    seen: HashSet<(GeneId, Channel)>,
}

impl OutputLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a gene as written on a channel. Returns `true` when this is the
    /// first write, `false` when the gene was already recorded.
    pub fn mark(&mut self, gene: GeneId, channel: Channel) -> bool {
        self.seen.insert((gene, channel))
    }

    pub fn is_marked(&self, gene: GeneId, channel: Channel) -> bool {
        self.seen.contains(&(gene, channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_mark_wins_subsequent_marks_report_seen() {
        let mut ledger = OutputLedger::new();
        let gene = GeneId(0);

        assert!(ledger.mark(gene, Channel::Session));
        assert!(!ledger.mark(gene, Channel::Session));
        assert!(ledger.is_marked(gene, Channel::Session));
    }

    #[test]
    fn channels_are_independent() {
        let mut ledger = OutputLedger::new();
        let gene = GeneId(3);

        assert!(ledger.mark(gene, Channel::History(EventType::MergeGene)));
        assert!(ledger.mark(gene, Channel::History(EventType::SplitGene)));
        assert!(ledger.mark(gene, Channel::Session));
        assert!(!ledger.is_marked(GeneId(4), Channel::Session));
    }
}
