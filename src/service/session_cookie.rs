//! The `refreshToken` cookie that carries the refresh token between requests.

pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Create an HttpOnly cookie holding the refresh token
pub fn create(token: &str, max_age_seconds: i64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        REFRESH_COOKIE_NAME,
        token,
        max_age_seconds.max(0),
        if secure { "; Secure" } else { "" }
    )
}

/// Cookie that makes the browser drop the refresh token
pub fn clear(secure: bool) -> String {
    create("", 0, secure)
}

/// Extract the refresh token from a `Cookie` header
pub fn extract(cookie_header: &str) -> Option<String> {
    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=')
            && name.trim() == REFRESH_COOKIE_NAME
        {
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
    }
    None
}
