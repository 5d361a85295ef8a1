pub mod demo;
pub mod error;
pub mod report;
pub mod serialize;
pub mod writer;
