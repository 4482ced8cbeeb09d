#![allow(dead_code)]

pub mod mock;
pub mod pool;
pub mod utils;
