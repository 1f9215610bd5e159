//! Frame graph error types.

use std::fmt;

/// Errors that can occur while declaring or running a frame graph.
///
/// All errors are surfaced synchronously from the offending call and leave
/// the graph unchanged: a failed operation takes no effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameGraphError {
    /// A handle's version no longer matches the resource it points to,
    /// or the handle refers to a replaced resource.
    InvalidHandle,
    /// A read or write was declared with a usage the resource does not
    /// permit (e.g. writing `UPLOADABLE` to an imported color attachment).
    IncompatibleUsage,
    /// A render target declaration is inconsistent.
    RenderTargetMisconfigured(String),
    /// `compile` was called more than once on the same declaration.
    DoubleCompile,
    /// `execute` was called without a preceding successful `compile`.
    ExecuteBeforeCompile,
}

impl fmt::Display for FrameGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle => write!(f, "invalid or stale resource handle"),
            Self::IncompatibleUsage => write!(f, "usage not permitted on this resource"),
            Self::RenderTargetMisconfigured(msg) => {
                write!(f, "render target misconfigured: {msg}")
            }
            Self::DoubleCompile => write!(f, "frame graph was already compiled"),
            Self::ExecuteBeforeCompile => {
                write!(f, "execute requires a preceding compile")
            }
        }
    }
}

impl std::error::Error for FrameGraphError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FrameGraphError::InvalidHandle;
        assert_eq!(err.to_string(), "invalid or stale resource handle");

        let err = FrameGraphError::RenderTargetMisconfigured("no attachments".to_string());
        assert_eq!(
            err.to_string(),
            "render target misconfigured: no attachments"
        );
    }
}
