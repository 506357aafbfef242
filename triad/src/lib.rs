//! Bounded, iterative three-role workflow engine.
//!
//! A goal is decomposed into tasks by a planner, each task gets a candidate
//! artifact from a developer, and a critic scores it; failed attempts retry
//! until success or a per-task iteration budget runs out, with every
//! transition persisted per session. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (plan validation, state
//!   transitions, invariants). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (session store, config, the
//!   reasoning-engine boundary). Isolated to enable mocking in tests.
//! - **[`agents`]**: The three roles, wiring prompts and output decoding to
//!   the reasoner and the conversation log.
//!
//! [`engine`] coordinates core logic with I/O to drive a session to a
//! terminal state.

pub mod agents;
pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
