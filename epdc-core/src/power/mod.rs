//! Controller power management

pub mod machine;

pub use machine::{PowerDownTicket, PowerEvent, PowerMachine, PowerState};
