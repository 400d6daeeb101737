//! Error types for linewise
//!
//! Every device-call boundary returns [`Result`]. The engine itself never
//! recovers from a device error: callers that want the historical
//! "crash with a diagnostic" behaviour wrap the outermost call in
//! [`fail_fast`], which logs the error and aborts the process.

use crate::dtype::DType;
use std::fmt::Display;
use std::panic::Location;
use thiserror::Error;

/// Result type alias using linewise's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while planning or launching linewise kernels
#[derive(Error, Debug)]
pub enum Error {
    /// Shape mismatch between a matrix and a broadcast vector or between views
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// An extent computation does not fit the caller's index type
    #[error("Index overflow: {what} does not fit in index type {index_type}")]
    IndexOverflow {
        /// Name of the index type
        index_type: &'static str,
        /// The quantity that overflowed
        what: &'static str,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// A device pointer is not aligned to its element size
    #[error("Misaligned {what}: address 0x{addr:x} is not a multiple of {align} bytes")]
    Misaligned {
        /// Which buffer is misaligned
        what: &'static str,
        /// The offending address
        addr: u64,
        /// Required alignment in bytes
        align: usize,
    },

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// A kernel launch (or other device call) was rejected
    ///
    /// Carries the textual form of the failing call and its source location.
    #[error("{call} failed at {file}:{line}: {reason}")]
    Launch {
        /// Textual form of the failing call
        call: &'static str,
        /// Source file of the call
        file: &'static str,
        /// Source line of the call
        line: u32,
        /// Device-runtime reason
        reason: String,
    },

    /// A kernel failed while executing; reported when the stream is synchronized
    #[error("Device fault in kernel '{kernel}': {reason}")]
    DeviceFault {
        /// Name of the faulting kernel
        kernel: &'static str,
        /// Description of the fault
        reason: String,
    },

    /// Backend limitation - operation valid but exceeds backend capabilities
    #[error("{backend} limitation: {operation} - {reason}")]
    BackendLimitation {
        /// The backend that has the limitation
        backend: &'static str,
        /// The operation being attempted
        operation: &'static str,
        /// Description of the limitation
        reason: String,
    },

    /// CUDA-specific error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create a launch error carrying the call text and location
    pub fn launch(call: &'static str, file: &'static str, line: u32, reason: impl Display) -> Self {
        Self::Launch {
            call,
            file,
            line,
            reason: reason.to_string(),
        }
    }

    /// Create a backend limitation error
    pub fn backend_limitation(
        backend: &'static str,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::BackendLimitation {
            backend,
            operation,
            reason: reason.into(),
        }
    }

    /// Returns true for errors raised by the device runtime rather than by argument checks
    pub fn is_device_error(&self) -> bool {
        match self {
            Self::Launch { .. } | Self::DeviceFault { .. } | Self::OutOfMemory { .. } => true,
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => true,
            _ => false,
        }
    }
}

/// Wrap a fallible device call, recording its text and source location on failure.
///
/// The wrapped expression must evaluate to a `Result<_, E>` with `E: Display`.
///
/// ```ignore
/// device_try!(stream.launch(kernel, cfg))?;
/// ```
#[macro_export]
macro_rules! device_try {
    ($call:expr) => {
        ($call).map_err(|e| $crate::error::Error::launch(stringify!($call), file!(), line!(), e))
    };
}

/// Unwrap a result, aborting the process with a diagnostic on error.
///
/// This is the fail-fast policy of the engine: device errors are treated as
/// unrecoverable, and no partial result is ever returned.
#[track_caller]
pub fn fail_fast<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => abort_with(&err, Location::caller()),
    }
}

#[cold]
#[inline(never)]
fn abort_with(err: &Error, location: &Location<'_>) -> ! {
    tracing::error!(error = %err, %location, "fatal device error, aborting");
    std::process::abort()
}
