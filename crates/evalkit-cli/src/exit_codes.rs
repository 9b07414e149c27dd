//! Process exit codes. Part of the CLI contract: CI scripts branch on them.

/// Nothing blocking was found.
pub const OK: i32 = 0;
/// Authoring problems: validation errors, prompts that fail to render.
pub const TEST_FAILED: i32 = 1;
/// The root config could not be loaded, or the tool itself failed.
pub const CONFIG_ERROR: i32 = 2;
