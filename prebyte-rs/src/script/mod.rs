//! The expansion engine.
//!
//! Text is scanned for action tokens (`%%name%%`, or `%%#directive` on a
//! line of its own), each of which expands to text or changes engine state:
//!
//! - variable substitution (`%%name%%`, `%%name[i]%%`, `%%ARGS[i]%%`)
//! - conditionals: `if` … `elif` … `else` … `endif`
//! - loops: `for item in LIST` … `endfor`
//! - macros and profiles: `define` … `enddef`, `exec`, `set profile`
//! - `include`, `set`/`unset`, built-ins such as `__DATE__`
//!
//! # Quick start
//!
//! ```rust
//! use prebyte::script::Interpreter;
//!
//! let mut interp = Interpreter::default();
//! let out = interp.run("%%set var X=6%%x=%%X%%", None).unwrap();
//! assert_eq!(out, "x=6");
//! ```

pub mod builtins;
pub mod cond;
pub mod directive;
pub mod interp;
pub mod resolve;
pub mod scan;
pub mod state;
pub mod value;

pub use cond::CondContext;
pub use interp::Interpreter;
pub use state::{LevelHook, State};
pub use value::Value;
