pub mod errors;
pub mod evaluator;
pub mod models;
