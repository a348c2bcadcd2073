//! A tiny shell-like command interpreter.
//!
//! A line goes through three steps: it is split into pipeline segments and
//! words ([`lexer`]), each word has its `$NAME`, `${NAME}` and `$( ... )`
//! expanded ([`expand`]) and the result is classified into commands
//! ([`parser`]). The [`Interpreter`] then runs the pipeline stage by stage,
//! feeding every stage the previous stage's output.
//!
//! Builtins (`cat`, `echo`, `wc`, `pwd`, `exit`, `grep`, `cd`) run in-process;
//! anything else is looked up on `PATH` and spawned as a child process.

pub mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod expand;
pub mod external;
mod interpreter;
pub mod lexer;
pub mod parser;
#[cfg(test)]
mod test_support;

/// Just a convenient re-export of the interpreter.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
