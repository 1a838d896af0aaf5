//! Reading Storage
//!
//! In-memory only: the service keeps a bounded buffer of scored readings
//! for the dashboard, history queries and CSV export. Restarting the
//! service starts with an empty history.

mod history;

pub use history::{HistoryQuery, Inserted, ReadingHistory};
