#![allow(clippy::result_large_err)]
//! tlafront-trace: read the states a model checker prints and encode
//! traces as ITF JSON.
//!
//! - [`parse_state()`] / [`extract_state()`] -- one `/\ x = v` state into a
//!   [`StateMap`]
//! - [`Trace`] -- a sequence of states, read from TLC output or built by
//!   hand, written out with [`Trace::to_itf()`]
//! - [`TraceOptions`] -- ITF output knobs
//!
//! Only the value shapes a state printer emits are accepted; everything
//! else fails with [`TraceError::Unsupported`].

mod error;
mod options;
mod state;
mod trace;
mod value;

pub use error::TraceError;
pub use options::TraceOptions;
pub use state::{extract_state, parse_state, StateMap};
pub use trace::{Trace, TraceState};
pub use value::Value;
