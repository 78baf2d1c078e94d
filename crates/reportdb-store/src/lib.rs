//! LanceDB-backed persistence for report fragments.
//!
//! Three tables live in one database: the document registry, free-text
//! chunks and extracted tables. Fragment tables carry a lower-cased
//! `search_text` column so keyword lookups can run as SQL `LIKE` filters.

pub mod ingest;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use ingest::{ingest_directory, ingest_report, IngestSummary};
pub use search::LanceFragmentStore;
pub use writer::FragmentWriter;
