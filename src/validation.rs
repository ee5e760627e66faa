//! Input validation for submitted video URLs

use crate::error::ValidationError;

/// Domain substring every accepted URL must contain
pub const PLATFORM_DOMAIN: &str = "tiktok.com";

/// Validate a raw URL from user input and return it trimmed
///
/// A URL is accepted only if, case-insensitively, it contains [`PLATFORM_DOMAIN`] and
/// starts with `http://` or `https://`.
///
/// # Examples
///
/// ```
/// use tiktok_dl::validation::validate_url;
/// use tiktok_dl::ValidationError;
///
/// assert!(validate_url(" https://www.tiktok.com/@user/video/123 ").is_ok());
/// assert_eq!(validate_url(""), Err(ValidationError::Empty));
/// assert_eq!(validate_url("https://example.com"), Err(ValidationError::NotTikTok));
/// ```
pub fn validate_url(raw: &str) -> Result<String, ValidationError> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(ValidationError::Empty);
    }

    let lowered = url.to_lowercase();
    if !lowered.contains(PLATFORM_DOMAIN) {
        return Err(ValidationError::NotTikTok);
    }
    if !(lowered.starts_with("http://") || lowered.starts_with("https://")) {
        return Err(ValidationError::UnsupportedScheme);
    }

    Ok(url.to_string())
}
