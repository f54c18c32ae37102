//! Integration test suite for the storage engine.
//!
//! 1. Record lifecycle and row ids
//! 2. Ephemeral sort/group stores
//! 3. Unclean shutdown, locking and bootstrap failures
//! 4. Concurrent readers

pub mod concurrency_tests;
pub mod engine_tests;
pub mod helpers;
pub mod recovery_tests;
pub mod temp_store_tests;
