//! Token masking for log and terminal output

use secrecy::{ExposeSecret, SecretString};

/// Masks a token for display purposes
///
/// Shows only the first 3 and last 3 characters.
///
/// # Examples
///
/// ```
/// use tao_publisher::security::token_mask::mask_token;
///
/// assert_eq!(mask_token("abcdefghijklmnop"), "abc...nop");
/// assert_eq!(mask_token("short"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }

    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

pub fn mask_secret(token: &SecretString) -> String {
    mask_token(token.expose_secret())
}

/// Replaces every occurrence of `token` in `text` with its masked form
///
/// Used on server messages and error strings before they are logged.
pub fn mask_in(text: &str, token: &SecretString) -> String {
    let token = token.expose_secret();
    if token.is_empty() {
        return text.to_string();
    }
    text.replace(token, &mask_token(token))
}
