//! Data loading and partitioning
//!
//! This module provides the CSV digit loader and the train/test splitter.

pub mod csv;
pub mod split;

pub use self::csv::*;
pub use self::split::*;
