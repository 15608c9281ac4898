//! Execution of compiled programs.

mod compare;
mod exec;
mod expr;
mod scope;

pub use exec::Executor;
