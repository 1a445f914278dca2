// Wi-Fi provisioning QR payload grammar (Android-style WIFI: payloads)

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default payload prefix; the recognized prefix is configurable at the
/// classifier level.
pub const WIFI_PREFIX: &str = "WIFI:";

/// Masked payloads and notes are clamped to this many characters.
pub const MAX_NOTE_LEN: usize = 200;

const PASSWORD_MASK: &str = "********";

/// Security type carried by a `T:` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    #[default]
    Wpa,
    Wpa2,
    Wpa3,
    Wep,
    Open,
}

impl Security {
    /// Normalize a raw `T:` token. Unknown but present values behave like WPA.
    pub fn from_qr_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "WPA3" | "SAE" => Security::Wpa3,
            "WPA2" | "RSN" => Security::Wpa2,
            "WEP" => Security::Wep,
            "NOPASS" | "OPEN" => Security::Open,
            _ => Security::Wpa,
        }
    }

    pub fn requires_password(&self) -> bool {
        !matches!(self, Security::Open)
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Security::Wpa => write!(f, "wpa"),
            Security::Wpa2 => write!(f, "wpa2"),
            Security::Wpa3 => write!(f, "wpa3"),
            Security::Wep => write!(f, "wep"),
            Security::Open => write!(f, "open"),
        }
    }
}

/// Parsed Wi-Fi credentials. Constructed only by [`parse`]; `security !=
/// Open` implies a non-empty password.
#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub security: Security,
    pub password: Option<String>,
    pub hidden: bool,
}

// The password never reaches a log sink, including through `{:?}`.
impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("security", &self.security)
            .field("password", &self.password.as_ref().map(|_| PASSWORD_MASK))
            .field("hidden", &self.hidden)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("not a WIFI: payload")]
    NotWifiPayload,
    #[error("missing SSID")]
    MissingSsid,
    #[error("missing password for secured network")]
    MissingPassword,
}

/// Parse a `WIFI:` payload into credentials.
///
/// Fields may appear in any order; `\;`, `\:` and `\\` escape literal
/// separators, other backslash sequences pass through untouched. Unknown
/// keys are ignored. Pure and deterministic, no I/O.
pub fn parse(raw: &str) -> Result<WifiCredentials, ParseError> {
    let payload = raw.trim();
    let body = payload
        .get(..WIFI_PREFIX.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(WIFI_PREFIX))
        .map(|_| &payload[WIFI_PREFIX.len()..])
        .ok_or(ParseError::NotWifiPayload)?;

    let pairs = split_pairs(body);

    let ssid = pairs.get("S").cloned().unwrap_or_default();
    if ssid.is_empty() {
        return Err(ParseError::MissingSsid);
    }

    let security = pairs
        .get("T")
        .map(|t| Security::from_qr_token(t))
        .unwrap_or_default();
    let hidden = pairs.get("H").map(|h| parse_hidden(h)).unwrap_or(false);
    let password = pairs.get("P").cloned().filter(|p| !p.is_empty());

    if security.requires_password() && password.is_none() {
        return Err(ParseError::MissingPassword);
    }

    Ok(WifiCredentials {
        ssid,
        security,
        password,
        hidden,
    })
}

/// Replace the password value of a payload with a fixed-length `*` run so
/// it can be logged. Payloads without a password field are truncated
/// instead.
pub fn mask_payload(payload: &str) -> String {
    if let Some(idx) = payload.find("P:").or_else(|| payload.find("p:")) {
        let value_start = idx + 2;
        let rest = &payload[value_start..];
        let tail = rest.find(';').map(|j| &rest[j..]).unwrap_or("");
        return format!("{}{}{}", &payload[..value_start], PASSWORD_MASK, tail);
    }
    truncate_payload(payload)
}

pub fn truncate_payload(payload: &str) -> String {
    payload.chars().take(MAX_NOTE_LEN).collect()
}

fn parse_hidden(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

/// Split the payload body into key/value pairs on unescaped `;`, keys
/// split from values on the first unescaped `:`.
fn split_pairs(body: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    let mut token = String::new();
    let mut chars = body.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                token.push(ch);
                if let Some(next) = chars.next() {
                    token.push(next);
                }
            }
            ';' => {
                flush_pair(&mut pairs, &token);
                token.clear();
            }
            _ => token.push(ch),
        }
    }
    flush_pair(&mut pairs, &token);

    pairs
}

fn flush_pair(pairs: &mut HashMap<String, String>, token: &str) {
    if token.is_empty() {
        return;
    }

    let mut split = None;
    let mut iter = token.char_indices();
    while let Some((i, ch)) = iter.next() {
        match ch {
            '\\' => {
                iter.next();
            }
            ':' => {
                split = Some(i);
                break;
            }
            _ => {}
        }
    }

    let (key, value) = match split {
        Some(i) => (&token[..i], &token[i + 1..]),
        None => (token, ""),
    };

    let key = key.trim().to_ascii_uppercase();
    if key.is_empty() {
        return;
    }
    pairs.insert(key, unescape(value).trim().to_string());
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some(&next @ (';' | ':' | '\\')) => {
                    out.push(next);
                    chars.next();
                }
                // unknown escapes pass through untouched
                _ => out.push(ch),
            }
        } else {
            out.push(ch);
        }
    }

    out
}
