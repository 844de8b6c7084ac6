pub mod common;
pub mod compatibility;
pub mod dataset;
pub mod denormalize;
pub mod errors;
pub mod evaluation;
pub mod linker;
pub mod plan;
pub mod plan_execution;
pub mod pools;
pub mod scale;
pub mod synthetic;
pub mod table_io;
