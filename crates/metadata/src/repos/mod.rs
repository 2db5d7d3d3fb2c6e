//! Repository traits for cache store operations.

pub mod generations;
pub mod jobs;
pub mod records;

pub use generations::GenerationRepo;
pub use jobs::ImportJobRepo;
pub use records::CacheRecordRepo;
