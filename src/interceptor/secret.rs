//! Secret decoding stage and the built-in AES-GCM handler.
//!
//! The expression stage recognizes `${handler::payload}` and records the
//! handler name on the value; this stage, sitting closer to the caller,
//! looks the handler up and splices the decoded plaintext in before the
//! value is returned.

use super::{ChainContext, Interceptor};
use crate::error::{ConfigError, ConfigResult};
use crate::value::ConfigValue;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey};
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the built-in AES-GCM handler.
pub const AES_GCM_HANDLER: &str = "aes-gcm-nopadding";

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const KEY_SIZE: usize = 32;

/// Named decoder turning an embedded ciphertext payload into plaintext.
pub trait SecretHandler: Send + Sync {
    /// Handler name, matched against the `${name::payload}` form.
    fn name(&self) -> &str;

    /// Decode one payload. Must be idempotent for the same payload.
    fn decode(&self, payload: &str) -> ConfigResult<String>;
}

/// Applies the handler recorded by the expression stage.
pub struct SecretInterceptor {
    enabled: bool,
    handlers: HashMap<String, Arc<dyn SecretHandler>>,
}

impl SecretInterceptor {
    pub fn new(enabled: bool, handlers: Vec<Arc<dyn SecretHandler>>) -> Self {
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.name().to_string(), handler))
            .collect();
        Self { enabled, handlers }
    }
}

impl Interceptor for SecretInterceptor {
    fn intercept(&self, ctx: ChainContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        let Some(mut value) = ctx.proceed(name)? else {
            return Ok(None);
        };
        if !self.enabled {
            return Ok(Some(value));
        }
        if let Some(handler_name) = value.secret_handler.take() {
            let handler = self
                .handlers
                .get(&handler_name)
                .ok_or_else(|| ConfigError::UnknownSecretHandler(handler_name.clone()))?;
            let plaintext = handler.decode(value.value.as_deref().unwrap_or_default())?;
            value = value
                .with_value(plaintext)
                .with_step(format!("secret handler {handler_name}"));
        }
        Ok(Some(value))
    }
}

/// AES-256-GCM secret handler.
///
/// The symmetric key is the SHA-256 hash of a configured encryption-key
/// string. Payloads are base64url without padding over
/// `[1-byte IV length][IV][ciphertext + 128-bit tag]`, the format the
/// external encryption CLI emits.
pub struct AesGcmSecretHandler {
    key: [u8; KEY_SIZE],
}

impl AesGcmSecretHandler {
    /// Derive the handler from the configured encryption-key string.
    pub fn new(encryption_key: &str) -> Self {
        let hash = digest::digest(&digest::SHA256, encryption_key.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(hash.as_ref());
        Self { key }
    }

    /// Encrypt plaintext into the payload this handler decodes.
    pub fn encrypt(&self, plaintext: &str) -> ConfigResult<String> {
        let rng = SystemRandom::new();
        let mut iv = [0u8; NONCE_SIZE];
        rng.fill(&mut iv)
            .map_err(|_| self.error("random IV generation failed"))?;

        let unbound = UnboundKey::new(&aead::AES_256_GCM, &self.key)
            .map_err(|_| self.error("invalid encryption key"))?;
        let mut sealing_key = SealingKey::new(unbound, SingleNonce::new(iv));

        let mut buffer = plaintext.as_bytes().to_vec();
        sealing_key
            .seal_in_place_append_tag(Aad::empty(), &mut buffer)
            .map_err(|_| self.error("encryption failed"))?;

        let mut message = Vec::with_capacity(1 + NONCE_SIZE + buffer.len());
        message.push(NONCE_SIZE as u8);
        message.extend_from_slice(&iv);
        message.extend_from_slice(&buffer);
        Ok(URL_SAFE_NO_PAD.encode(message))
    }

    /// Encrypt plaintext into the full `${aes-gcm-nopadding::...}` literal.
    pub fn encrypt_to_expression(&self, plaintext: &str) -> ConfigResult<String> {
        Ok(format!("${{{AES_GCM_HANDLER}::{}}}", self.encrypt(plaintext)?))
    }

    fn error(&self, reason: &str) -> ConfigError {
        ConfigError::SecretDecode {
            handler: AES_GCM_HANDLER.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl SecretHandler for AesGcmSecretHandler {
    fn name(&self) -> &str {
        AES_GCM_HANDLER
    }

    fn decode(&self, payload: &str) -> ConfigResult<String> {
        let message = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|err| self.error(&format!("payload is not base64url: {err}")))?;

        let (&iv_len, rest) = message
            .split_first()
            .ok_or_else(|| self.error("payload is empty"))?;
        if iv_len as usize != NONCE_SIZE {
            return Err(self.error(&format!("unsupported IV length {iv_len}")));
        }
        if rest.len() < NONCE_SIZE + TAG_SIZE {
            return Err(self.error("payload too short"));
        }

        let mut iv = [0u8; NONCE_SIZE];
        iv.copy_from_slice(&rest[..NONCE_SIZE]);

        let unbound = UnboundKey::new(&aead::AES_256_GCM, &self.key)
            .map_err(|_| self.error("invalid encryption key"))?;
        let mut opening_key = OpeningKey::new(unbound, SingleNonce::new(iv));

        let mut buffer = rest[NONCE_SIZE..].to_vec();
        let plaintext = opening_key
            .open_in_place(Aad::empty(), &mut buffer)
            .map_err(|_| self.error("authentication failed"))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| self.error("plaintext is not valid UTF-8"))
    }
}

/// Nonce sequence usable exactly once.
struct SingleNonce {
    nonce: Option<[u8; NONCE_SIZE]>,
}

impl SingleNonce {
    fn new(nonce: [u8; NONCE_SIZE]) -> Self {
        Self { nonce: Some(nonce) }
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        self.nonce
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}
