//! The baseline built-in function set the core VM ships: string/array
//! utilities and time helpers, reachable from bytecode via the `call`
//! opcode.
//!
//! Application-level libraries (MongoDB, Redis, OAuth2, HTTP routing) are
//! out of scope here; hosts register them on top of [`baseline`] using
//! [`Registry::register`].

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod registry;

pub use registry::{baseline, BuiltinFn, Registry};
