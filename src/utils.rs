//! Utility functions for display formatting, cookies, URLs and saving files

use crate::error::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Cookie the backend issues its anti-forgery token in
pub const CSRF_COOKIE: &str = "csrftoken";

/// Header the anti-forgery token is echoed in
pub const CSRF_HEADER: &str = "X-CSRFToken";

static VIDEO_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"/video/(\d+)", r"/v/(\d+)"]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

/// Format a like/play/share count for display
///
/// Counts of a million or more use one decimal and `M`, counts of a thousand or more
/// use one decimal and `K`. Rounding is half up on the exact decimal value, so 1450
/// renders as `1.5K`.
///
/// # Examples
///
/// ```
/// use tiktok_dl::utils::format_count;
///
/// assert_eq!(format_count(Some(999)), "999");
/// assert_eq!(format_count(Some(1500)), "1.5K");
/// assert_eq!(format_count(Some(2_300_000)), "2.3M");
/// assert_eq!(format_count(None), "0");
/// ```
pub fn format_count(count: Option<u64>) -> String {
    let n = match count {
        None | Some(0) => return "0".to_string(),
        Some(n) => n,
    };

    let (divisor, suffix) = if n >= 1_000_000 {
        (1_000_000u128, 'M')
    } else if n >= 1_000 {
        (1_000u128, 'K')
    } else {
        return n.to_string();
    };

    // tenths of the unit, rounded half up
    let tenths = (n as u128 * 10 + divisor / 2) / divisor;
    format!("{}.{}{}", tenths / 10, tenths % 10, suffix)
}

/// Read the anti-forgery token from a `Cookie` header value
///
/// An absent cookie yields an empty token, never an error.
pub fn csrf_token_from_cookies(cookie_header: &str) -> String {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == CSRF_COOKIE)
        .map(|(_, value)| {
            let value = value.trim();
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .unwrap_or_default()
}

/// Strip the query string and fragment from a video URL
pub fn clean_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Extract the numeric video id from `/video/<id>` or `/v/<id>` URLs
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract a file name from an HTTP response
///
/// Tries the `Content-Disposition` header first (`filename=` and RFC 5987 `filename*=`),
/// then the last path segment of the URL, then falls back to `"download"`. Any directory
/// components are dropped.
pub fn extract_filename_from_response(response: &reqwest::Response, url: &str) -> String {
    if let Some(content_disposition) = response.headers().get("content-disposition")
        && let Ok(value) = content_disposition.to_str()
        && let Some(name) = filename_from_content_disposition(value)
    {
        return name;
    }

    if let Ok(parsed_url) = url::Url::parse(url)
        && let Some(mut segments) = parsed_url.path_segments()
        && let Some(last_segment) = segments.next_back()
        && let Some(name) = sanitize_filename(last_segment)
    {
        return name;
    }

    "download".to_string()
}

fn filename_from_content_disposition(value: &str) -> Option<String> {
    // Format: attachment; filename="file.mp4" or filename*=UTF-8''file.mp4
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            let encoded = encoded.rsplit('\'').next().unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded)
                && let Some(name) = sanitize_filename(&decoded)
            {
                return Some(name);
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            if let Some(name) = sanitize_filename(name.trim_matches('"')) {
                return Some(name);
            }
        }
    }
    None
}

fn sanitize_filename(name: &str) -> Option<String> {
    let name = Path::new(name).file_name()?.to_str()?.trim();
    if name.is_empty() || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Fetch `url` and write the body into `dir`, returning the written path
///
/// The file name comes from [`extract_filename_from_response`]. Non-2xx responses are
/// reported as upstream errors.
pub async fn save_download(http: &reqwest::Client, url: &str, dir: &Path) -> Result<PathBuf> {
    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(Error::Upstream {
            message: format!("download returned HTTP {}", response.status()),
        });
    }

    let filename = extract_filename_from_response(&response, url);
    let bytes = response.bytes().await?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(filename);
    tokio::fs::write(&path, &bytes).await?;

    tracing::info!(url = %url, path = ?path, bytes = bytes.len(), "saved download");
    Ok(path)
}
