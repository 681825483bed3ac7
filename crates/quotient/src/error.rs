//! Error types for cgroup quota resolution.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`QuotaError`].
pub type QuotaResult<T> = Result<T, QuotaError>;

/// Errors produced while resolving cgroup paths and quota values.
#[derive(Error, Diagnostic, Debug)]
pub enum QuotaError {
    /// A mount-info line did not match the expected positional layout.
    #[error("invalid mount info at {path}:{line_no}: {line:?}")]
    #[diagnostic(code(quotient::mountinfo::malformed))]
    MalformedMountInfo {
        /// Source file the line was read from.
        path: PathBuf,
        /// 1-based line number within the source file.
        line_no: usize,
        /// The offending line.
        line: String,
    },

    /// A cgroup membership line did not have the `id:subsystems:path` shape.
    #[error("invalid cgroup membership at {path}:{line_no}: {line:?}")]
    #[diagnostic(code(quotient::cgroup::malformed))]
    MalformedCgroup {
        /// Source file the line was read from.
        path: PathBuf,
        /// 1-based line number within the source file.
        line_no: usize,
        /// The offending line.
        line: String,
    },

    /// A membership path lies outside the mount's root and cannot be
    /// translated to an on-host path.
    #[error("cgroup path {path} is not exposed from mount point {mount_point} (root {root})")]
    #[diagnostic(code(quotient::mount::not_exposed))]
    PathNotExposed {
        /// Where the hierarchy is mounted on the host.
        mount_point: PathBuf,
        /// The portion of the hierarchy that is mounted there.
        root: PathBuf,
        /// The membership path that falls outside `root`.
        path: PathBuf,
    },

    /// The process declares membership in a subsystem that no cgroup mount
    /// carries.
    #[error("no cgroup mount matches subsystem {subsystem:?}")]
    #[diagnostic(
        code(quotient::subsys::unmatched),
        help("the membership table names a hierarchy that is not mounted in this namespace")
    )]
    UnmatchedSubsystem {
        /// The subsystem with no matching mount.
        subsystem: String,
    },

    /// A control file held a value that could not be parsed.
    #[error("invalid value in {path}: {value:?}")]
    #[diagnostic(code(quotient::param::invalid))]
    InvalidParam {
        /// The control file that was read.
        path: PathBuf,
        /// The unparsable value.
        value: String,
    },

    /// A CPU quota is set but its period is zero or invalid.
    #[error("cpu quota is set but the period in {path} is invalid: {value:?}")]
    #[diagnostic(code(quotient::quota::inconsistent))]
    InconsistentQuota {
        /// The control file holding the period.
        path: PathBuf,
        /// The invalid period value.
        value: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(quotient::io))]
    Io(#[from] std::io::Error),
}
