//! Output shapes shared by the CLI commands: terminal text, JSON envelopes and SARIF.

pub mod console;
pub mod json;
pub mod sarif;
