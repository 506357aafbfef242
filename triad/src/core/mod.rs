//! Pure, deterministic workflow logic.
//!
//! No I/O here: plan decoding, state transitions, and invariant checks are
//! fully testable in isolation.

pub mod invariants;
pub mod plan;
pub mod state;
pub mod types;
