pub mod error;
pub mod io;
pub mod pipeline;
pub mod problem;
pub mod upload;
pub mod utils;
