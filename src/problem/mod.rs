pub mod builder;
pub mod distance_matrix;
pub mod instance;
pub mod schema;
pub mod solution;
