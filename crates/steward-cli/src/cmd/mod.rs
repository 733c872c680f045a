pub mod config;
pub mod init;
pub mod insights;
pub mod outcomes;
pub mod report;
pub mod run;
pub mod serve;
pub mod status;
pub mod weights;
