pub mod dates;
pub mod wire;

pub use dates::{DateSpan, ProjectionInputError, parse_date, task_span};
pub use wire::{WireTask, ingest, ingest_all, normalize_priority, normalize_status};
