//! Endpoint resolution
//!
//! A custom endpoint always wins. Without one, the SDK resolves the regional
//! endpoint itself, except when TLS is disabled: the SDK has no switch for
//! that, so the regional endpoint is spelled out with an `http` scheme.

use skiff_core::{Error, Result, S3Settings};
use url::Url;

/// Endpoint URL to hand to the SDK, or `None` to let it resolve one
pub fn resolve_endpoint(settings: &S3Settings) -> Result<Option<String>> {
    let scheme = if settings.disable_ssl { "http" } else { "https" };

    match settings.endpoint.as_deref() {
        Some(endpoint) => {
            let candidate = if endpoint.contains("://") {
                endpoint.to_string()
            } else {
                format!("{scheme}://{endpoint}")
            };

            let url = Url::parse(&candidate).map_err(|e| {
                Error::Connection(format!("invalid endpoint '{endpoint}': {e}"))
            })?;
            if url.host_str().is_none() {
                return Err(Error::Connection(format!(
                    "endpoint '{endpoint}' has no host"
                )));
            }

            Ok(Some(url.as_str().trim_end_matches('/').to_string()))
        }
        None if settings.disable_ssl => regional_endpoint(&settings.region, scheme).map(Some),
        None => Ok(None),
    }
}

fn regional_endpoint(region: &str, scheme: &str) -> Result<String> {
    let valid = !region.is_empty()
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(Error::Connection(format!(
            "cannot resolve endpoint for region '{region}'"
        )));
    }

    let suffix = if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    };

    Ok(format!("{scheme}://s3.{region}.{suffix}"))
}
