/// A payload was decoded, or the command completed.
pub const SUCCESS: i32 = 0;
/// Bad arguments, configuration, scenario file or output failure.
pub const EXECUTION_ERROR: i32 = 1;
/// The session ended in `Failed` with a classified error.
pub const SCAN_FAILED: i32 = 2;
/// The session stopped without a payload (timed out or cancelled).
pub const NO_RESULT: i32 = 3;
