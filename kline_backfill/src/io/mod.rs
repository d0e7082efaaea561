pub mod cursor_store;
pub mod elasticsearch;
pub mod memory;
pub mod sink;
pub mod symbols;

pub use cursor_store::{CursorStore, CursorStoreError, FileCursorStore};
pub use elasticsearch::ElasticsearchSink;
pub use memory::MemorySink;
pub use sink::{DocumentSink, SinkError, UpsertOutcome};
pub use symbols::{SymbolsError, read_symbols};
