// SPDX-License-Identifier: MPL-2.0

use core::fmt;

use int_to_c_enum::TryFromInt;

use crate::regs::ErrorIrq;

/// The error types used in this crate.
///
/// The discriminant of each variant is the status code reported to the
/// driver layer. A status code of `0` means success and has no variant.
#[repr(i32)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, TryFromInt)]
pub enum Errno {
    /// Malformed, misaligned or unsupported arguments.
    InvalidArgs = 1,
    /// The descriptor region is too small for the chain.
    OutOfMemory = 2,
    /// The ADMA3 batch holds more commands than supported.
    OutOfRange = 3,
    /// The controller did not signal completion in time.
    Timeout = 4,
    /// A DMA interrupt was raised by an engine that never raises it.
    UnexpectedIrq = 5,
    /// The slot already owns another in-flight request.
    Busy = 6,
    /// The slot is locked by another context.
    TryLockFailed = 7,
    /// The error interrupt fired without a known cause.
    DeviceError = 15,
    /// Command timeout error.
    CmdTimeout = 16,
    /// Command CRC error.
    CmdCrc = 17,
    /// Command end bit error.
    CmdEndBit = 18,
    /// Command index error.
    CmdIndex = 19,
    /// Data timeout error.
    DataTimeout = 20,
    /// Data CRC error.
    DataCrc = 21,
    /// Data end bit error.
    DataEndBit = 22,
    /// Current limit error.
    CurrentLimit = 23,
    /// Auto CMD error.
    AutoCmd = 24,
    /// ADMA error.
    AdmaFailed = 25,
    /// Tuning error.
    TuningFailed = 26,
    /// Response error.
    ResponseFailed = 27,
}

impl Errno {
    /// Decodes the error interrupt status into the most specific cause.
    ///
    /// Lower bits win when several causes are reported at once, which
    /// puts command-phase errors ahead of data-phase errors.
    pub fn from_error_status(status: ErrorIrq) -> Self {
        if status.is_empty() {
            return Errno::DeviceError;
        }
        let bit = status.bits().trailing_zeros() as i32;
        Errno::try_from(Errno::CmdTimeout as i32 + bit).unwrap_or(Errno::DeviceError)
    }

    /// Returns the status code of this error type.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Returns `true` if the error was reported by the controller hardware.
    pub fn is_hardware_error(self) -> bool {
        self.code() >= Errno::DeviceError.code()
    }
}

/// The error with an error type and an error message used in this crate.
#[derive(Clone, Debug)]
pub struct Error {
    errno: Errno,
    msg: Option<&'static str>,
}

impl Error {
    /// Creates a new error with the given error type and no error message.
    pub const fn new(errno: Errno) -> Self {
        Error { errno, msg: None }
    }

    /// Creates a new error with the given error type and the error message.
    pub const fn with_msg(errno: Errno, msg: &'static str) -> Self {
        Error {
            errno,
            msg: Some(msg),
        }
    }

    /// Returns the error type.
    pub fn errno(&self) -> Errno {
        self.errno
    }

    /// Returns the error message, if any.
    pub fn msg(&self) -> Option<&'static str> {
        self.msg
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        Error::new(errno)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.msg {
            Some(msg) => write!(f, "{:?}: {}", self.errno, msg),
            None => write!(f, "{:?}", self.errno),
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Converts the result of a driver-facing operation into a status code.
///
/// Returns `0` on success and the error type's code otherwise.
pub fn status_code<T>(result: &core::result::Result<T, Error>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.errno().code(),
    }
}

#[macro_export]
macro_rules! return_errno {
    ($errno: expr) => {
        return core::result::Result::Err($crate::Error::new($errno))
    };
}

#[macro_export]
macro_rules! return_errno_with_msg {
    ($errno: expr, $msg: expr) => {
        return core::result::Result::Err($crate::Error::with_msg($errno, $msg))
    };
}
