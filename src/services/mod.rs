pub mod output_writers;

pub use output_writers::{writers_for, OutputWriter, WriteOptions};
