use base64::Engine;

/// Random bytes behind every session token.
pub const TOKEN_BYTES: usize = 32;
/// Length of generated record identifiers (team and task ids).
pub const ID_LEN: usize = 12;

/// The OS random source could not be read.
#[derive(Debug, thiserror::Error)]
#[error("entropy source failed: {0}")]
pub struct EntropyError(String);

impl From<getrandom::Error> for EntropyError {
    fn from(e: getrandom::Error) -> Self {
        EntropyError(e.to_string())
    }
}

const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Mint an opaque session token: 256 bits from the OS CSPRNG, base64url without padding.
pub fn generate_token() -> Result<String, EntropyError> {
    let mut buf = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut buf)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// 12-character alphanumeric identifier. Bytes at or above the largest multiple of
/// the charset size are redrawn so every character is equally likely.
pub fn generate_id() -> Result<String, EntropyError> {
    let limit = (256 / ID_CHARSET.len() * ID_CHARSET.len()) as u8;
    let mut out = String::with_capacity(ID_LEN);
    let mut buf = [0u8; 32];
    while out.len() < ID_LEN {
        getrandom::getrandom(&mut buf)?;
        for b in buf.iter().copied().filter(|b| *b < limit) {
            if out.len() == ID_LEN { break; }
            out.push(ID_CHARSET[b as usize % ID_CHARSET.len()] as char);
        }
    }
    Ok(out)
}

/// Short, non-secret prefix of a token for log lines.
pub fn token_hint(token: &str) -> &str {
    token.get(..8).unwrap_or("")
}
