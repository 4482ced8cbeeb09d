pub mod ddl;
pub mod encoder;
pub mod error;
pub mod file;
pub mod params;
pub mod quote;
pub mod vertica;
pub mod warehouse;
