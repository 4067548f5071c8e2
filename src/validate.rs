//! Field validators shared by create inputs and patches.

use crate::error::{ApiError, ApiResult};
use regex_lite::Regex;
use std::sync::LazyLock;

pub const MIN_PASSWORD_LEN: usize = 3;
pub const MIN_LABEL_LEN: usize = 3;
pub const MAX_LABEL_LEN: usize = 1000;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

pub fn non_blank(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::required(field));
    }
    Ok(())
}

pub fn email(field: &str, value: &str) -> ApiResult<()> {
    non_blank(field, value)?;
    if !EMAIL_RE.is_match(value) {
        return Err(ApiError::validation(field, "must be a well-formed email address"));
    }
    Ok(())
}

pub fn password(field: &str, value: &str) -> ApiResult<()> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            field,
            &format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

pub fn label_name(field: &str, value: &str) -> ApiResult<()> {
    non_blank(field, value)?;
    let len = value.chars().count();
    if !(MIN_LABEL_LEN..=MAX_LABEL_LEN).contains(&len) {
        return Err(ApiError::validation(
            field,
            &format!(
                "must be between {} and {} characters",
                MIN_LABEL_LEN, MAX_LABEL_LEN
            ),
        ));
    }
    Ok(())
}
