use crate::error::{AppError, AppResult};

/// Checks user-written text. Content is never trimmed or truncated here;
/// trimming only decides whether there is anything there at all.
pub fn content(text: &str, max_chars: usize, what: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", what)));
    }
    let len = text.chars().count();
    if len > max_chars {
        return Err(AppError::Validation(format!(
            "{} must be {} characters or less (got {})",
            what, max_chars, len
        )));
    }
    Ok(())
}

pub fn page(page: u32) -> AppResult<()> {
    if page == 0 {
        return Err(AppError::Validation("page starts at 1".into()));
    }
    Ok(())
}
