pub mod candidates;
pub mod config;
pub mod coordinator;
pub mod cycle;
pub mod error;
pub mod insight;
pub mod io;
pub mod learner;
pub mod outcome;
pub mod paths;
pub mod report;
pub mod selector;
pub mod snapshot;
pub mod thresholds;
pub mod types;
pub mod weights;

pub use error::{Result, StewardError};
