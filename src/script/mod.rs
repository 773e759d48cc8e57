//! User script execution and static scanning

pub mod sandbox;
pub mod scan;

pub use sandbox::{ScriptKind, ScriptSandbox};
