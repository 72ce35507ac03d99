pub mod dom;
pub mod models;
pub mod parse;
pub mod problem;
pub mod sample;
pub mod solver;

pub use models::repair::{Extractor, ModelConfig, RepairMip, Report, SolveError};
pub use problem::{RepairProblem, Weights};
