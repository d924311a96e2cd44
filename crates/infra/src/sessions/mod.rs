//! Server-side session persistence.

pub mod in_memory;
pub mod postgres;
pub mod repository;

pub use in_memory::InMemorySessionRepository;
pub use postgres::PgSessionRepository;
pub use repository::{SaveSession, SessionRecord, SessionRepoError, SessionRepository};
