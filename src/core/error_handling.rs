//! Generic error handling utilities
//!
//! Provides unified error handling that can work across different error types
//! while maintaining domain-specific error logging patterns.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// # Implementation Consistency
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`. When it returns `false`, `user_message()` should return `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message the user can act on
    ///
    /// Examples: invalid configuration, a full queue the caller may retry.
    /// Counter-examples: poisoned locks, failed thread spawns.
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<String>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// - user-actionable errors show their own message
/// - system errors show the operation context, with details at debug level
///
/// # Examples
/// ```rust,no_run
/// # use taskring::core::error_handling::log_error_with_context;
/// # use taskring::executor::api::{ExecutorConfig, ExecutorKind};
/// let err = ExecutorConfig::new("ring", ExecutorKind::RingBuffer)
///     .set_threads(4)
///     .unwrap_err();
/// log_error_with_context(&err, "Executor configuration");
/// // Logs: "FATAL: Illegal executor configuration: ..."
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    if error.is_user_actionable() {
        if let Some(user_msg) = error.user_message() {
            log::error!("FATAL: {}", user_msg);
        } else {
            log::error!("FATAL: {}", operation_context);
        }
    } else {
        log::error!("FATAL: {}", operation_context);
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
