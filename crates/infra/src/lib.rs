//! Infrastructure layer: Postgres pool, session persistence, directory
//! readers, token purge, background workers.

pub mod db;
pub mod directory;
pub mod sessions;
pub mod tokens;
pub mod workers;
