// Batch state machine
//
// The state of a batch is derived from its counters and timestamps. Every
// mutation goes through `batch_state_machine::apply`, which checks guards,
// mutates the record and reports which transitions the mutation caused.

pub mod batch_state_machine;
pub mod events;
pub mod guards;
pub mod states;

pub use batch_state_machine::Transition;
pub use events::BatchEvent;
pub use states::BatchState;
