//! Message validation rules.

use notifyhub_core::error::AppError;

/// Validates a raw inbound frame before decoding.
pub fn validate_inbound(raw: &str, max_bytes: usize) -> Result<(), AppError> {
    if raw.len() > max_bytes {
        return Err(AppError::validation(format!(
            "Message exceeds maximum size of {max_bytes} bytes"
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty message"));
    }

    Ok(())
}
