//! tiny42 command-line front end
//!
//! The binary in `main.rs` parses arguments and wires up logging; the
//! command implementations live here so they can be tested against a mock
//! runtime.

pub mod commands;
