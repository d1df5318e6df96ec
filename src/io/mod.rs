pub mod artifact;
pub mod config;
pub mod section_parser;
pub mod side_channel;
pub mod solution_reader;
