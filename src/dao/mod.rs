/// Result store implementations.
pub mod match_store;
/// Persistence model definitions.
pub mod models;
/// Storage abstraction layer errors.
pub mod storage;
