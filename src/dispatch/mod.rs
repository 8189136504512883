//! Role dispatch: decide what this process is, then hand off to it

pub mod dispatcher;
pub mod mode;

pub use dispatcher::{DispatchError, RoleDispatcher, RoleOutcome};
pub use mode::{present_selectors, InvocationMode, Selector, SELECTOR_PRIORITY};
