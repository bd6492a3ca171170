//! Target URL validation
//!
//! Every submitted URL passes through here before a request is created, so
//! nothing downstream has to re-check scheme or host.

use anyhow::{anyhow, Result};
use url::Url;

/// Longest URL accepted for a scan
pub const MAX_URL_LENGTH: usize = 2048;

/// Validate a URL submitted for scanning
///
/// Accepts only absolute `http`/`https` URLs with a host and no embedded
/// credentials. Surrounding whitespace is ignored.
///
/// # Returns
/// * `Ok(Url)` - The parsed URL
/// * `Err` - With a message suitable for an `InvalidRequest` error
pub fn validate_target_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(anyhow!("URL cannot be empty"));
    }

    if trimmed.len() > MAX_URL_LENGTH {
        return Err(anyhow!(
            "URL is too long ({} characters, maximum {})",
            trimmed.len(),
            MAX_URL_LENGTH
        ));
    }

    if trimmed.contains('\0') {
        return Err(anyhow!("Null byte detected in URL"));
    }

    let url = Url::parse(trimmed).map_err(|e| anyhow!("Malformed URL {:?}: {}", trimmed, e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(anyhow!(
                "Unsupported URL scheme {:?}: only http and https can be scanned",
                other
            ))
        }
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(anyhow!("URL has no host: {}", trimmed)),
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(anyhow!("URLs with embedded credentials are not allowed"));
    }

    Ok(url)
}
