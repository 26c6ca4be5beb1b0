//! The score pipeline.
//!
//! Validates uploaded rows into a [`types::Dataset`], groups them by exam
//! date into class aggregates, joins a student's history against those
//! aggregates, and summarizes the spread of score series. Everything here is
//! pure and synchronous.

pub mod aggregate;
pub mod series;
pub mod types;
pub mod utility;
pub mod validate;
pub mod volatility;

pub use aggregate::aggregate_by_exam;
pub use series::build_student_series;
pub use validate::validate;
pub use volatility::{class_spread, exam_median_volatility, student_volatility, volatility};
