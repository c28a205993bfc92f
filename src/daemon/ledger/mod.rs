//! The accounting core of the daemon. [state::UsageLedger] is the pure
//! active/idle state machine, [module::LedgerModule] owns it together with the
//! tick cadence and persistence, and is the single writer of its state.

pub mod event;
pub mod module;
pub mod state;
