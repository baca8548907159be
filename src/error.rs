//! Pipeline error taxonomy.
//!
//! Most failures in the orchestration pipeline are recovered locally
//! (classification defaults to internal mode, capability resolution degrades
//! to zero external tools, single tool failures are summarized per-call).
//! The variants here are the ones that cross a stage boundary and drive the
//! dual-path fallback controller.

use thiserror::Error;

/// Errors that can abort an execution path.
///
/// A [`PipelineError`] surfacing from the rich path triggers a retry via the
/// internal-only path; one surfacing from both paths is converted into a
/// structured error envelope. Raw collaborator messages never reach the
/// client; [`PipelineError::code`] and [`PipelineError::user_message`]
/// produce the user-safe payload.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Intent classification failed. Recovered by defaulting to internal
    /// mode; kept as a variant so degradations stay observable.
    #[error("intent classification failed: {0}")]
    Classification(String),

    /// External capability resolution (connection lookup, tool schema fetch)
    /// failed or timed out.
    #[error("capability resolution failed: {0}")]
    CapabilityResolution(String),

    /// A language model turn failed.
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// Tool execution infrastructure failed as a whole (individual tool
    /// failures are captured per-call and do not raise this).
    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    /// The caller is not allowed to act as the claimed member. Surfaced as a
    /// 401/403-class rejection before any model invocation.
    #[error("authorization failed: {0}")]
    Authorization(String),
}

impl PipelineError {
    /// Machine-readable error code for the response payload.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Classification(_) => "intent_classification_failed",
            Self::CapabilityResolution(_) => "capability_resolution_failed",
            Self::ModelInvocation(_) => "model_invocation_failed",
            Self::ToolExecution(_) => "tool_execution_failed",
            Self::Authorization(_) => "authorization_failed",
        }
    }

    /// User-safe message with a next-step suggestion. Never includes the
    /// underlying collaborator error text.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Classification(_) | Self::ModelInvocation(_) | Self::ToolExecution(_) => {
                "The assistant is temporarily unavailable. Please try again in a moment."
            }
            Self::CapabilityResolution(_) => {
                "Connected app lookup is temporarily unavailable. You can retry, or rephrase the request to use workspace data only."
            }
            Self::Authorization(_) => {
                "You are not authorized to act as the requested member. Check the member id and your credentials."
            }
        }
    }
}
