//! Device names and fingerprints from User-Agent strings.
//!
//! The session list shows a human-readable name per device ("Chrome on
//! macOS"); the fingerprint ties a session to a (user agent, IP) pair for
//! recognition across logins. Parsing is heuristic and only cosmetic;
//! nothing security-relevant hangs off it.

/// Derives a display name like "Chrome on macOS" from a User-Agent.
#[must_use]
pub fn device_name_from_user_agent(user_agent: Option<&str>) -> String {
    match user_agent {
        Some(ua) => format!("{} on {}", browser_of(ua), os_of(ua)),
        None => "Unknown Device".to_string(),
    }
}

/// Hashes (user agent, IP) into a stable device fingerprint.
#[must_use]
pub fn device_fingerprint(user_agent: Option<&str>, ip: Option<&str>) -> String {
    let mut input = String::new();
    input.push_str(user_agent.unwrap_or(""));
    input.push('\n');
    input.push_str(ip.unwrap_or(""));
    crate::crypto::sha256_hex(&input)
}

// Order matters below: Chrome's UA contains "Safari", Edge's contains
// "Chrome", so the more specific tokens are checked first.
fn browser_of(ua: &str) -> &'static str {
    let ua = ua.to_lowercase();
    if ua.contains("edg/") || ua.contains("edge/") {
        "Edge"
    } else if ua.contains("opr/") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("firefox/") {
        "Firefox"
    } else if ua.contains("chrome/") {
        "Chrome"
    } else if ua.contains("safari/") {
        "Safari"
    } else if ua.contains("curl/") {
        "curl"
    } else {
        "Unknown Browser"
    }
}

fn os_of(ua: &str) -> &'static str {
    let ua = ua.to_lowercase();
    if ua.contains("windows") {
        "Windows"
    } else if ua.contains("iphone") {
        "iOS"
    } else if ua.contains("ipad") {
        "iPadOS"
    } else if ua.contains("mac os x") || ua.contains("macintosh") {
        "macOS"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("cros") {
        "Chrome OS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Unknown OS"
    }
}
