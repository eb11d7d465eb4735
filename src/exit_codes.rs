//! Exit codes for the titlekit binary

/// Successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// Generic error (avoid using - be more specific)
pub const EXIT_ERROR: i32 = 1;

/// Query answered in the negative (stub module, missing build tag, ...)
pub const EXIT_NEGATIVE: i32 = 2;

/// Panic or unrecoverable error
pub const EXIT_PANIC: i32 = 101;

/// Title manager reported an error
pub const EXIT_MANAGER_ERROR: i32 = 102;

/// Signed container, content map or build tag could not be parsed
pub const EXIT_FORMAT_ERROR: i32 = 103;

/// Forging exhausted the search field
pub const EXIT_FORGE_ERROR: i32 = 104;

/// Invalid command-line arguments
pub const EXIT_INVALID_ARGS: i32 = 105;

/// I/O error (file not found, permission denied, disk error)
pub const EXIT_IO_ERROR: i32 = 106;

/// Key material missing or unusable
pub const EXIT_KEY_ERROR: i32 = 107;
