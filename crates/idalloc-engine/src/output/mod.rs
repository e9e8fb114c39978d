//! Output consumers driven by the event collection's lookup
//!
//! All three consumers are pure readers of the feature graph; the only
//! state they touch is the collection's idempotence ledger, so re-running
//! any of them against the same collection is safe.

pub mod gff;
pub mod history;
pub mod session;

pub use gff::GffRewriter;
pub use history::HistoryWriter;
pub use session::SessionWriter;
