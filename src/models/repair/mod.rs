pub mod model;
pub mod schedule;
pub mod sets_and_parameters;

pub use model::{ModelConfig, RepairMip, SolveError, Variables};
pub use schedule::{
    BasketStatus, BatchRecord, ExtractError, Extractor, ObjectiveBreakdown, ProductRecord, Report,
};
