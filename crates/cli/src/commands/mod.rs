pub mod analyze;
pub mod dataset;
pub mod evaluate;
