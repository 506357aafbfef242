//! Side-effecting operations: session persistence, config, the reasoning
//! boundary, and prompt rendering. Isolated to enable mocking in tests.

pub mod config;
pub mod process;
pub mod prompt;
pub mod reasoner;
pub mod session_store;
