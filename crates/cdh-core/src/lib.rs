pub mod action;
pub mod backend;
pub mod config;
pub mod edit;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod keys;
pub mod outcome;
pub mod paths;
pub mod pipeline;
pub mod recipes;
pub mod replication;
pub mod report;
pub mod ssh;
pub mod stage;
pub mod template;

pub use error::{InstallError, Result};
