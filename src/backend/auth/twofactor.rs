/**
 * Second-Factor Engine (TOTP)
 *
 * Time-based one-time passwords plus at-rest encryption of the shared seed.
 *
 * # Protocol
 *
 * - 20-byte random seed, base64-encoded, shared with the authenticator app
 *   through an `otpauth://` provisioning URI exactly once at enrollment.
 * - 6-digit TOTP-SHA1 codes over 30-second steps.
 * - Verification accepts the current step plus one step either side
 *   (90 seconds of clock skew tolerance).
 *
 * # At-rest encryption
 *
 * The seed is stored AES-256-GCM encrypted under a server-held key; the
 * stored form is `base64(nonce || ciphertext)`. The plaintext seed is never
 * retrievable through the API after enrollment.
 */
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as base64_engine, Engine as _};
use rand::Rng;
use totp_lite::{totp_custom, Sha1};

use crate::backend::error::ApiError;

/// TOTP time step in seconds (standard).
const TIME_STEP_SECS: u64 = 30;
/// Number of code digits.
const DIGITS: u32 = 6;
/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

const ISSUER: &str = "veilchat";

/// One-time enrollment payload returned at registration. Never stored and
/// never retrievable again in plaintext.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TotpEnrollment {
    /// Base64-encoded seed for manual entry.
    pub seed: String,
    /// otpauth:// URI for QR-code provisioning.
    pub provisioning_uri: String,
}

/// Generate a fresh random seed and its provisioning URI.
pub fn generate_enrollment(account: &str) -> TotpEnrollment {
    let mut rng = rand::thread_rng();
    let mut seed_bytes = [0u8; 20];
    rng.fill(&mut seed_bytes);
    let seed = base64_engine.encode(seed_bytes);

    let provisioning_uri = format!(
        "otpauth://totp/{issuer}:{account}?secret={seed}&issuer={issuer}",
        issuer = ISSUER,
        account = urlencoding::encode(account),
        seed = seed,
    );

    TotpEnrollment {
        seed,
        provisioning_uri,
    }
}

/// Compute the code for a given seed and Unix time. Exposed for tests and
/// for enrollment confirmation flows.
pub fn code_at(seed_b64: &str, unix_secs: u64) -> Option<String> {
    let seed = base64_engine.decode(seed_b64).ok()?;
    Some(totp_custom::<Sha1>(TIME_STEP_SECS, DIGITS, &seed, unix_secs))
}

/// Verify a code against the seed with a ±1 step window.
pub fn verify_code(seed_b64: &str, code: &str, unix_secs: u64) -> bool {
    if code.len() != DIGITS as usize || !code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let seed = match base64_engine.decode(seed_b64) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let candidates = [
        unix_secs.saturating_sub(TIME_STEP_SECS),
        unix_secs,
        unix_secs + TIME_STEP_SECS,
    ];
    candidates
        .iter()
        .any(|t| totp_custom::<Sha1>(TIME_STEP_SECS, DIGITS, &seed, *t) == code)
}

/// Encrypt a seed for at-rest storage: `base64(nonce || ciphertext)`.
pub fn encrypt_seed(key: &[u8; 32], seed: &str) -> Result<String, ApiError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, seed.as_bytes())
        .map_err(|_| ApiError::Internal("seed encryption failed".to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(base64_engine.encode(blob))
}

/// Decrypt a stored seed.
pub fn decrypt_seed(key: &[u8; 32], stored: &str) -> Result<String, ApiError> {
    let blob = base64_engine
        .decode(stored)
        .map_err(|_| ApiError::Internal("stored seed is not valid base64".to_string()))?;
    if blob.len() <= NONCE_LEN {
        return Err(ApiError::Internal("stored seed is truncated".to_string()));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| ApiError::Internal("seed decryption failed".to_string()))?;
    String::from_utf8(plaintext)
        .map_err(|_| ApiError::Internal("decrypted seed is not utf-8".to_string()))
}
