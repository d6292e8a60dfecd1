//! Turn-taking: who is speaking, and when is a user turn complete
//!
//! `machine` holds the pure state machine; `controller` wraps it with the
//! silence timer for use from the session loop.

mod controller;
mod machine;

pub use controller::TurnController;
pub use machine::{TurnAction, TurnEvent, TurnMachine, TurnState};
