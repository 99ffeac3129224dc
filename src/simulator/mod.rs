pub mod command;
pub mod invoker;

pub use command::{SimBackend, SimCommand};
pub use invoker::{ProcessInvoker, SimOutcome, SimulatorInvoker};
