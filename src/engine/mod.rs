//! Registration engine — the conversational state machine and join rules.

pub mod registration;
pub mod state;

pub use registration::{Reply, RegistrationEngine};
pub use state::FlowState;
