pub mod program;
pub mod repair;
pub mod utils;

pub use repair::RepairMip;
