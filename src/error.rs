//! Error types for the snapshot pipeline

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// A layout axis, used to report which dimension collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Horizontal => f.write_str("width"),
            Axis::Vertical => f.write_str("height"),
        }
    }
}

/// Errors that can occur while rendering, caching or exporting snapshots
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to start the renderer or another pipeline component
    #[error("Initialization failed: {0}")]
    InitializationError(String),

    /// The scenario content laid out to empty bounds
    #[error("The view laid out with zero {axis} in scenario `{scenario}` ({file}:{line})")]
    ZeroSizeLayout {
        scenario: String,
        axis: Axis,
        file: &'static str,
        line: u32,
    },

    /// Scenario content panicked while building its view
    #[error("Scenario `{scenario}` panicked while rendering ({file}:{line}): {message}")]
    ContentPanicked {
        scenario: String,
        file: &'static str,
        line: u32,
        message: String,
    },

    /// The scenario's render waiter was never fulfilled before its deadline
    #[error("Scenario `{scenario}` was not ready for capture after {}ms", .waited.as_millis())]
    NotReady { scenario: String, waited: Duration },

    /// A batch run exceeded its global deadline
    #[error("The snapshots were not taken within the given time ({}s).", .0.as_secs_f64())]
    Timeout(Duration),

    /// One or more snapshot files could not be written
    #[error("{}", writing_failure_message(.0))]
    WritingFailure(Vec<PathBuf>),

    /// Failed to encode a raster buffer
    #[error("Failed to encode snapshot: {0}")]
    EncodeError(String),

    /// Failed to decode cached bytes
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Programmer errors are never retried and abort batch runs immediately.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Error::ZeroSizeLayout { .. } | Error::ContentPanicked { .. } | Error::ConfigError(_)
        )
    }
}

fn writing_failure_message(paths: &[PathBuf]) -> String {
    let lines: Vec<String> = paths.iter().map(|p| format!("- {}", p.display())).collect();
    format!(
        "The snapshot image could not be written in the following destination.\n{}",
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writing_failure_lists_every_destination() {
        let err = Error::WritingFailure(vec![PathBuf::from("/a/b.png"), PathBuf::from("/a/c.png")]);
        let msg = err.to_string();
        assert!(msg.contains("- /a/b.png\n- /a/c.png"));
    }

    #[test]
    fn timeout_reports_configured_duration() {
        let err = Error::Timeout(Duration::from_secs(600));
        assert!(err.to_string().contains("(600s)"));
    }

    #[test]
    fn zero_size_identifies_scenario_and_location() {
        let err = Error::ZeroSizeLayout {
            scenario: "Empty".to_string(),
            axis: Axis::Vertical,
            file: "src/demo.rs",
            line: 12,
        };
        assert!(err.is_programmer_error());
        assert_eq!(
            err.to_string(),
            "The view laid out with zero height in scenario `Empty` (src/demo.rs:12)"
        );
    }

    #[test]
    fn panicking_content_is_a_programmer_error() {
        let err = Error::ContentPanicked {
            scenario: "Broken".to_string(),
            file: "src/demo.rs",
            line: 40,
            message: "index out of bounds".to_string(),
        };
        assert!(err.is_programmer_error());
        assert!(err.to_string().contains("(src/demo.rs:40): index out of bounds"));
        assert!(!Error::Other("flaky".to_string()).is_programmer_error());
    }
}
