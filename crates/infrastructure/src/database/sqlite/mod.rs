mod sqlite_job_repository;

pub use sqlite_job_repository::{SqliteJobRepository, SqliteQueueClaim};
