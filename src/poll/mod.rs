//! Task polling: a pure reducer ([`machine`]) driven by an async loop
//! ([`driver`]) that can be cancelled at any await point ([`cancel`]).

pub mod cancel;
pub mod driver;
pub mod machine;

pub use cancel::{CancelSignal, CancelSource};
pub use driver::{drive, PollOutcome};
pub use machine::{PollMachine, PollState, ProgressUpdate, ReportedStatus, TickDecision};
