pub mod core;
pub mod records;
pub mod report;
