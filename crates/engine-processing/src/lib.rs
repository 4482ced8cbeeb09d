pub mod pool;
pub mod worker;
