//! One-shot messages carried across a redirect in a signed cookie.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use docfill_std::error::prelude::*;
use hmac::{Hmac, Mac};
use hyper::header::{COOKIE, HeaderMap};
use serde::Serialize;
use sha2::Sha256;

/// The cookie holding a pending message.
pub const FLASH_COOKIE: &str = "docfill_flash";

type HmacSha256 = Hmac<Sha256>;

/// A message shown once on the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    /// The message category, e.g. `error`.
    pub category: String,
    /// The message text.
    pub message: String,
}

impl Flash {
    /// Creates an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            category: "error".to_owned(),
            message: message.into(),
        }
    }
}

/// Signs and verifies flash cookies.
#[derive(Clone)]
pub struct FlashSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for FlashSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashSigner").finish_non_exhaustive()
    }
}

impl FlashSigner {
    /// Creates a signer from a secret key.
    pub fn new(key: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(key).context_ut("invalid flash key")?;
        Ok(Self { mac })
    }

    /// Encodes a message as `payload.signature`.
    pub fn encode(&self, flash: &Flash) -> String {
        let payload = URL_SAFE_NO_PAD.encode(format!("{}:{}", flash.category, flash.message));
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    /// Decodes a cookie value, rejecting anything not signed with our key.
    pub fn decode(&self, value: &str) -> Option<Flash> {
        let (payload, signature) = value.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            log::debug!("ignoring flash cookie with a bad signature");
            return None;
        }

        let payload = String::from_utf8(URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
        let (category, message) = payload.split_once(':')?;
        Some(Flash {
            category: category.to_owned(),
            message: message.to_owned(),
        })
    }

    /// Builds the `Set-Cookie` value carrying a message.
    pub fn set_cookie(&self, flash: &Flash) -> String {
        format!(
            "{FLASH_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            self.encode(flash)
        )
    }

    /// Reads the pending message from request headers.
    ///
    /// The outer option tells whether a flash cookie was sent at all, so that
    /// a bad cookie can still be cleared.
    pub fn pending(&self, headers: &HeaderMap) -> Option<Option<Flash>> {
        let value = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|header| header.split(';'))
            .find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name == FLASH_COOKIE).then_some(value)
            })?;
        Some(self.decode(value))
    }
}

/// The `Set-Cookie` value removing a consumed message.
pub fn clear_cookie() -> String {
    format!("{FLASH_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}
