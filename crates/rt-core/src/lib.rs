//! Core table model for the rocket result browser
//!
//! This crate provides the row schema and the filter, sort, viewport and
//! preference engines a table instance is assembled from. It has no notion of
//! where rows come from or how they are drawn.

pub mod columns;
pub mod filter;
pub mod prefs;
pub mod row;
pub mod sort;
pub mod state;
pub mod view;
pub mod viewport;

// Re-export commonly used types
pub use columns::{ColumnDescriptor, ComparatorKind, FilterKind, COLUMNS};
pub use filter::{option_domain, Choice, FilterError, FilterState, Predicate, RangeBounds};
pub use prefs::{
    FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, PreferenceSync, PrefsError,
};
pub use row::{Cell, ColumnId, Row, Value, NOT_APPLICABLE};
pub use sort::{SortDirection, SortKey, SortState};
pub use state::{RequestId, TableConfig, TableStatus};
pub use view::derive_view;
pub use viewport::ViewportWindow;
