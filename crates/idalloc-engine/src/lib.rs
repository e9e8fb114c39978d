//! IdAlloc Engine
//!
//! Reconciles successive genome-annotation gene models, classifies each
//! locus-level change, obtains permanent identifiers from the OSID
//! identifier authority, records provenance between old and new
//! identifiers, and rewrites the annotation file to carry the newly
//! allocated identifiers.
//!
//! # Pipeline shape
//!
//! Data flows one way: the annotation-event database feeds
//! [`event::AnnotationEvent`] construction, the allocation protocols call
//! the identifier authority, the provenance resolver links ancestors to
//! descendants, and the [`collection::EventCollection`] index drives the
//! history, session, and GFF output consumers.
//!
//! # Example
//!
//! ```no_run
//! use idalloc_engine::collection::EventCollection;
//! use idalloc_engine::feature::CollisionMode;
//! use idalloc_engine::osid::{OsidClient, OsidConfig};
//! use idalloc_engine::source::DbEventSource;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = sqlx::PgPool::connect("postgres://localhost/events").await?;
//!     let source = DbEventSource::new(pool);
//!     let authority = OsidClient::new(OsidConfig {
//!         base_url: "https://osid.example.org/api/".into(),
//!         user: "pipeline".into(),
//!         password: "secret".into(),
//!         collection_id: 1,
//!     })?;
//!     let collection = EventCollection::create(
//!         "anopheles_gambiae",
//!         &source,
//!         &authority,
//!         CollisionMode::Overwrite,
//!     )
//!     .await?;
//!     println!("{:?}", collection.allocated_id_for("AGAP004050"));
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod event;
pub mod feature;
pub mod ledger;
pub mod model;
pub mod osid;
pub mod output;
pub mod source;
pub mod store;

pub use collection::EventCollection;
pub use event::{AnnotationEvent, EventType};
pub use feature::{CollisionMode, FeatureIndex};
pub use model::{GeneModel, Locus, Provenance, TranscriptModel};
