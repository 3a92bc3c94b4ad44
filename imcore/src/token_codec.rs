use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Wire prefix for internal session tokens: `im:<opaque>`.
pub const SESSION_TOKEN_PREFIX: &str = "im:";

const MIN_LENGTH: usize = 16;
const MAX_LENGTH: usize = 1024;

/// CSPRNG bytes, base64url (no padding) encoded. `length` is the number of
/// random bytes, clamped to `[16, 1024]`.
pub fn generate(length: usize) -> String {
    let length = length.clamp(MIN_LENGTH, MAX_LENGTH);
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn format_session_token(opaque: &str) -> String {
    format!("{SESSION_TOKEN_PREFIX}{opaque}")
}

/// Strips the `im:` prefix; `None` if the value isn't in that form at all
/// (the pipeline then defers to the next scheme instead of failing).
pub fn strip_session_prefix(bearer: &str) -> Option<&str> {
    bearer.strip_prefix(SESSION_TOKEN_PREFIX)
}

#[derive(Clone, Copy, Debug)]
pub struct RedactOptions {
    pub rune: char,
    pub count: usize,
    pub prefix: usize,
    pub suffix: usize,
}

impl Default for RedactOptions {
    fn default() -> Self {
        RedactOptions {
            rune: '#',
            count: 8,
            prefix: 8,
            suffix: 4,
        }
    }
}

/// Degrades `"prefix########suffix"` -> `"########suffix"` -> `"########"`
/// as the input shrinks; the hidden run is always exactly `count` runes
/// regardless of how much material was actually hidden.
pub fn redact(raw: &str, opts: RedactOptions) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let hidden: String = std::iter::repeat(opts.rune).take(opts.count).collect();

    let after_suffix = chars.len() as i64 - opts.suffix as i64;
    if after_suffix < 0 {
        return hidden;
    }
    let suffix: String = chars[chars.len() - opts.suffix..].iter().collect();

    let after_prefix = after_suffix - opts.prefix as i64;
    if after_prefix < 0 {
        return format!("{hidden}{suffix}");
    }
    let prefix: String = chars[..opts.prefix].iter().collect();
    format!("{prefix}{hidden}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_clamps_to_minimum_length() {
        let token = generate(1);
        // 16 raw bytes -> base64url no-pad length 22
        assert!(token.len() >= 22);
    }

    #[test]
    fn redact_full_form_for_long_input() {
        let out = redact("ABCDEFGHIJKLMNOPQRSTUVWXYZ", RedactOptions::default());
        assert_eq!(out, "ABCDEFGH########WXYZ");
    }

    #[test]
    fn redact_degrades_for_short_input() {
        let opts = RedactOptions::default();
        let out = redact("short", opts);
        assert_eq!(out, "########hort");
    }

    #[test]
    fn redact_fully_hidden_for_very_short_input() {
        let opts = RedactOptions::default();
        let out = redact("ab", opts);
        assert_eq!(out, "########");
    }

    #[test]
    fn redact_never_exposes_the_middle() {
        let secret = "im:super-secret-opaque-token-value";
        let out = redact(secret, RedactOptions::default());
        assert!(!out.contains("secret-opaque"));
    }

    #[test]
    fn session_token_round_trips_format_and_strip() {
        let opaque = generate(64);
        let wire = format_session_token(&opaque);
        assert_eq!(strip_session_prefix(&wire), Some(opaque.as_str()));
    }
}
