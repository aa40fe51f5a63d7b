//! Redirect Localization
//!
//! Rewrites upstream redirect targets that point back at the upstream host so
//! the browser stays on the local development endpoint.

use super::ProxySettings;

/// Rewrites `location` to the local endpoint when its authority is the upstream host.
///
/// `https` locations get the local SSL port, everything else the plain port.
/// Returns `None` for relative locations and for any other host; those are
/// passed through unchanged by the caller.
pub fn localize_location(location: &str, settings: &ProxySettings) -> Option<String> {
    let (scheme, rest) = split_scheme(location)?;

    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    if !authority.eq_ignore_ascii_case(&settings.host) {
        return None;
    }

    let local_port = if scheme.eq_ignore_ascii_case("https") {
        settings.ssl_port
    } else {
        settings.port
    };

    let prefix = if scheme.is_empty() {
        "//".to_string()
    } else {
        format!("{}://", scheme)
    };
    Some(format!("{}{}:{}{}", prefix, settings.dev_host, local_port, tail))
}

/// Splits `scheme://rest` or protocol-relative `//rest`. Relative paths yield `None`.
fn split_scheme(location: &str) -> Option<(&str, &str)> {
    if let Some(rest) = location.strip_prefix("//") {
        return Some(("", rest));
    }

    let (scheme, rest) = location.split_once("://")?;
    let valid = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}
