//! Request URL scanning for the interception hot path
//!
//! These functions avoid allocations and work directly on string slices.
//! They are deliberately lenient: anything they cannot make sense of yields
//! `None`, and the interceptor lets such requests through.

// =============================================================================
// Scheme
// =============================================================================

/// Schemes a network request can be intercepted on.
const WEB_SCHEMES: &[&[u8]] = &[b"http", b"https", b"ws", b"wss"];

/// Get the position just after "://".
#[inline]
pub fn scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();
    let colon_pos = bytes.iter().position(|&b| b == b':')?;

    let valid_scheme = bytes[..colon_pos]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'));
    if colon_pos == 0 || !valid_scheme {
        return None;
    }

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        Some(colon_pos + 3)
    } else {
        None
    }
}

/// Check whether the URL uses http(s) or ws(s).
#[inline]
pub fn is_web_scheme(url: &str) -> bool {
    let Some(end) = scheme_end(url) else {
        return false;
    };
    let scheme = &url.as_bytes()[..end - 3];
    WEB_SCHEMES.iter().any(|s| scheme.eq_ignore_ascii_case(s))
}

// =============================================================================
// Host
// =============================================================================

/// Get the start and end byte positions of the hostname in a URL.
///
/// Userinfo and port are excluded. Bracketed IPv6 literals keep their brackets.
#[inline]
pub fn host_position(url: &str) -> Option<(usize, usize)> {
    let start = scheme_end(url)?;
    let bytes = url.as_bytes();

    // Authority ends at the first '/', '?' or '#'
    let authority_end = bytes[start..]
        .iter()
        .position(|&b| matches!(b, b'/' | b'?' | b'#'))
        .map_or(bytes.len(), |i| start + i);

    // Skip userinfo (last '@' inside the authority)
    let host_start = bytes[start..authority_end]
        .iter()
        .rposition(|&b| b == b'@')
        .map_or(start, |i| start + i + 1);

    let host_end = if bytes.get(host_start) == Some(&b'[') {
        let close = bytes[host_start..authority_end].iter().position(|&b| b == b']')?;
        host_start + close + 1
    } else {
        bytes[host_start..authority_end]
            .iter()
            .position(|&b| b == b':')
            .map_or(authority_end, |i| host_start + i)
    };

    Some((host_start, host_end))
}

/// Extract the hostname as a slice of the original URL.
///
/// Returns `None` when the URL has no authority or the host is empty.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (start, end) = host_position(url)?;
    if start == end {
        return None;
    }
    Some(&url[start..end])
}

/// Compare two hostnames ignoring ASCII case and one trailing dot on `host`.
#[inline]
pub fn host_eq(host: &str, domain: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    host.eq_ignore_ascii_case(domain)
}
