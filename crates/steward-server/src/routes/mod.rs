pub mod cycles;
pub mod events;
pub mod insights;
pub mod outcomes;
pub mod report;
pub mod status;
pub mod weights;
