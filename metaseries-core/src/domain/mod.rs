//! Domain types for metaseries

pub mod frequency;
pub mod request;
pub mod series;
pub mod table;

pub use frequency::{Frequency, FrequencyParseError};
pub use request::{CacheKey, FetchRequest, SeriesRequest, SeriesResult};
pub use series::{Observation, Series};
pub use table::{AssembledTable, LongRow, TableColumn, DATE_COLUMN};
