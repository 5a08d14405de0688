//! Header names written or read by the router, in their wire casing.

/// Methods a route answers to.
pub const ALLOW: &str = "Allow";
pub const CACHE_CONTROL: &str = "Cache-Control";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const VARY: &str = "Vary";
pub const ORIGIN: &str = "Origin";
pub const USER_AGENT: &str = "User-Agent";

pub const ACCESS_CONTROL_ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const ACCESS_CONTROL_ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";
pub const ACCESS_CONTROL_ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
pub const ACCESS_CONTROL_ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
pub const ACCESS_CONTROL_EXPOSE_HEADERS: &str = "Access-Control-Expose-Headers";
pub const ACCESS_CONTROL_MAX_AGE: &str = "Access-Control-Max-Age";
pub const ACCESS_CONTROL_REQUEST_METHOD: &str = "Access-Control-Request-Method";
pub const ACCESS_CONTROL_REQUEST_HEADERS: &str = "Access-Control-Request-Headers";

/// Request correlation id, echoed by the logging middleware.
pub const X_LOGGER_ID: &str = "X-Logger-ID";
pub const TRUE_CLIENT_IP: &str = "True-Client-IP";
pub const X_REAL_IP: &str = "X-Real-IP";
pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";

/// Canonical MIME-style form of a header name: the first letter and every letter
/// after a hyphen are upper-cased, the rest lower-cased (`accept-encoding` becomes
/// `Accept-Encoding`).
///
/// A name containing a space or any byte that is not a valid header token
/// character is returned unchanged.
#[must_use]
pub fn canonical_header_key(name: &str) -> String {
    if !name.bytes().all(is_token_byte) {
        return name.to_string();
    }

    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::canonical_header_key;

    #[test]
    fn test_canonical_header_key() {
        assert_eq!(canonical_header_key("content-type"), "Content-Type");
        assert_eq!(canonical_header_key("X-REQUESTED-WITH"), "X-Requested-With");
        assert_eq!(canonical_header_key("x-api-key"), "X-Api-Key");
        assert_eq!(canonical_header_key("etag"), "Etag");
        assert_eq!(canonical_header_key("bad header"), "bad header");
        assert_eq!(canonical_header_key(""), "");
    }
}
