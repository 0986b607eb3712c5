#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more checks failed.
    ChecksFailed = 10,

    /// Invalid CLI/config/options (bad flags, invalid durations, negative targets, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, metric registration clashes, etc.).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_checks(checks_failed: bool) -> Self {
        if checks_failed {
            Self::ChecksFailed
        } else {
            Self::Success
        }
    }
}
