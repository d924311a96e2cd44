//! Background workers.

pub mod expiry_cleaner;

pub use expiry_cleaner::{
    CleanerConfig, ExpiryCleaner, SessionSweeper, Sweeper, TokenSweeper, WorkerHandle,
};
