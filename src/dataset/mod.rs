//! IAMC observation tables.
pub mod frame;
pub mod observation;

pub use frame::{Dataset, Filter, SeriesKey};
pub use observation::{Dimension, Observation};
