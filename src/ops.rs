//! The op surface: every host primitive user code can reach.
//!
//! The set is closed: console capture, cryptographic random, digests,
//! base64, and `fetch` (in `fetch.rs`). There is no filesystem op, no
//! environment op, no process op, and no timer op that schedules work.
//! `bootstrap.js` wraps these into Web-shaped globals.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, Engine, GeneralPurpose, GeneralPurposeConfig};
use deno_core::anyhow::anyhow;
use deno_core::error::AnyError;
use deno_core::{op2, OpState};
use sha2::Digest;

// ============================================================================
// Console capture
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn parse(level: &str) -> Self {
        match level {
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Log,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured console line, in emission order.
#[derive(Debug, Clone)]
pub struct ConsoleLine {
    pub level: LogLevel,
    pub message: String,
}

/// Per-render console buffer. The host installs a fresh one at the start of
/// each render; the console ops append to whichever buffer is current.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    lines: Vec<ConsoleLine>,
}

impl ConsoleSink {
    pub fn take(&mut self) -> Vec<ConsoleLine> {
        std::mem::take(&mut self.lines)
    }
}

#[op2(fast)]
pub fn op_console_emit(state: &mut OpState, #[string] level: &str, #[string] message: &str) {
    if let Some(sink) = state.try_borrow_mut::<ConsoleSink>() {
        sink.lines.push(ConsoleLine {
            level: LogLevel::parse(level),
            message: message.to_string(),
        });
    }
}

// ============================================================================
// Crypto
// ============================================================================

fn random_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[op2]
#[string]
pub fn op_random_uuid() -> String {
    random_uuid()
}

#[op2(fast)]
pub fn op_fill_random(#[buffer] buf: &mut [u8]) {
    use rand::RngCore;
    rand::thread_rng().fill_bytes(buf);
}

fn digest_with<D: Digest>(data: &[u8]) -> Vec<u8> {
    D::digest(data).to_vec()
}

fn digest(algorithm: &str, data: &[u8]) -> Result<Vec<u8>, AnyError> {
    match algorithm.to_ascii_uppercase().replace('-', "").as_str() {
        "SHA1" => Ok(digest_with::<sha1::Sha1>(data)),
        "SHA256" => Ok(digest_with::<sha2::Sha256>(data)),
        "SHA384" => Ok(digest_with::<sha2::Sha384>(data)),
        "SHA512" => Ok(digest_with::<sha2::Sha512>(data)),
        _ => Err(anyhow!(
            "unsupported digest algorithm '{algorithm}' (supported: SHA-1, SHA-256, SHA-384, SHA-512)"
        )),
    }
}

#[op2]
#[buffer]
pub fn op_digest(#[string] algorithm: &str, #[buffer] data: &[u8]) -> Result<Vec<u8>, AnyError> {
    digest(algorithm, data)
}

// ============================================================================
// Base64 (browser btoa/atob semantics)
// ============================================================================

// atob accepts unpadded input after whitespace stripping.
const FORGIVING_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn base64_encode(text: &str) -> Result<String, AnyError> {
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let cp = ch as u32;
        if cp > 0xff {
            return Err(anyhow!(
                "InvalidCharacterError: btoa input contains a character outside the Latin-1 range"
            ));
        }
        bytes.push(cp as u8);
    }
    Ok(FORGIVING_STANDARD.encode(bytes))
}

fn base64_decode(data: &str) -> Result<String, AnyError> {
    let stripped: String = data
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c'))
        .collect();
    let bytes = FORGIVING_STANDARD
        .decode(stripped)
        .map_err(|_| anyhow!("InvalidCharacterError: atob input is not well-formed base64"))?;
    Ok(bytes.into_iter().map(|b| b as char).collect())
}

#[op2]
#[string]
pub fn op_base64_encode(#[string] text: &str) -> Result<String, AnyError> {
    base64_encode(text)
}

#[op2]
#[string]
pub fn op_base64_decode(#[string] data: &str) -> Result<String, AnyError> {
    base64_decode(data)
}

// ============================================================================
// Extension wiring
// ============================================================================

use crate::fetch::op_fetch;

deno_core::extension!(
    ssr_ops,
    ops = [
        op_console_emit,
        op_random_uuid,
        op_fill_random,
        op_digest,
        op_base64_encode,
        op_base64_decode,
        op_fetch,
    ],
    esm_entry_point = "ext:ssr_ops/bootstrap.js",
    esm = ["ext:ssr_ops/bootstrap.js" = "src/bootstrap.js"],
);
