pub mod permits;
pub mod runner;

pub use permits::{PermitGuard, Permits};
pub use runner::{run_sandboxed, SandboxRequest, SandboxRun};

use crate::shared::redact::redact_secrets;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Terminal,
    Transient,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Transient => "transient",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal failures are configuration or runtime defects a retry cannot
/// fix; transient ones are worth retrying.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SandboxError {
    #[error("{reason}")]
    Terminal {
        reason: String,
        remediation: Option<String>,
        user_message: String,
    },
    #[error("{reason}")]
    Transient { reason: String, user_message: String },
}

impl SandboxError {
    pub fn terminal(
        reason: impl Into<String>,
        remediation: Option<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self::Terminal {
            reason: redact_secrets(&reason.into()),
            remediation,
            user_message: redact_secrets(&user_message.into()),
        }
    }

    pub fn transient(reason: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self::Transient {
            reason: redact_secrets(&reason.into()),
            user_message: redact_secrets(&user_message.into()),
        }
    }

    pub fn classification(&self) -> ErrorClass {
        match self {
            Self::Terminal { .. } => ErrorClass::Terminal,
            Self::Transient { .. } => ErrorClass::Transient,
        }
    }

    pub fn user_message(&self) -> &str {
        match self {
            Self::Terminal { user_message, .. } | Self::Transient { user_message, .. } => {
                user_message
            }
        }
    }

    pub fn remediation(&self) -> Option<&str> {
        match self {
            Self::Terminal { remediation, .. } => remediation.as_deref(),
            Self::Transient { .. } => None,
        }
    }
}

const TERMINAL_STDERR_PATTERNS: [&str; 7] = [
    "unknown flag",
    "no such file or directory",
    "not found",
    "invalid argument",
    "for \"--mount\" flag",
    "invalid reference format",
    "permission denied",
];

/// Pure classifier for a container runtime's non-zero exit.
pub fn classify_stderr(stderr: &str) -> ErrorClass {
    let lowered = stderr.to_lowercase();
    if TERMINAL_STDERR_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
    {
        ErrorClass::Terminal
    } else {
        ErrorClass::Transient
    }
}
