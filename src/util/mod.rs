use std::io;
use std::os::unix::prelude::*;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

pub use self::unix::isatty;

/// Logs the error of a `Result` that the caller has decided not to propagate.
macro_rules! log_if_err {
    ($result:expr, $fmt:expr) => {
        if let Err(ref e) = $result {
            error!(concat!($fmt, ": {}"), e);
        }
    };
    ($result:expr, $fmt:expr, $($arg:tt)*) => {
        if let Err(ref e) = $result {
            error!(concat!($fmt, ": {}"), $($arg)*, e);
        }
    };
}

pub mod unix;

/// PSH Utility Extensions for `ExitStatus`
pub trait PshExitStatusExt {
    /// Create an ExitStatus to indicate *successful* program execution.
    fn from_success() -> Self;

    /// Create an ExitStatus to indicate *unsuccessful* program execution.
    fn from_failure() -> Self;

    /// Create an ExitStatus from a status code
    fn from_status(code: i32) -> Self;
}

impl PshExitStatusExt for ExitStatus {
    /// # Examples
    /// ```rust
    /// use psh::PshExitStatusExt;
    /// use std::process::ExitStatus;
    /// assert!(ExitStatus::from_success().success());
    /// ```
    fn from_success() -> Self {
        ExitStatus::from_status(0)
    }

    /// # Examples
    /// ```rust
    /// use psh::PshExitStatusExt;
    /// use std::process::ExitStatus;
    /// assert!(!ExitStatus::from_failure().success());
    /// ```
    fn from_failure() -> Self {
        ExitStatus::from_status(1)
    }

    /// # Examples
    /// ```rust
    /// use psh::PshExitStatusExt;
    /// use std::process::ExitStatus;
    /// assert!(ExitStatus::from_status(0).success());
    /// assert_eq!(ExitStatus::from_status(130).code(), Some(130));
    /// ```
    fn from_status(code: i32) -> Self {
        ExitStatus::from_raw((code & 0xff) << 8)
    }
}

pub fn get_terminal() -> RawFd {
    io::stdin().as_raw_fd()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_wrap_like_u8() {
        assert_eq!(ExitStatus::from_status(256 + 3).code(), Some(3));
        assert!(!ExitStatus::from_status(127).success());
    }
}
