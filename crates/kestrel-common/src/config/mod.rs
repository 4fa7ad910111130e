//! Configuration for the Kestrel execution core.
//!
//! Operator-specific configuration lives next to the operators in
//! `kestrel-exec`; this module holds the settings shared by a fragment.

mod exec;

pub use exec::ExecConfig;
