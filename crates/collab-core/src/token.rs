//! Session token generation.

use data_encoding::BASE32_NOPAD;
use rand::{TryRngCore, rngs::OsRng};

use crate::{CollabError, SessionId};

/// Length of a session token in characters.
pub const SESSION_TOKEN_LEN: usize = 10;

const ENTROPY_BYTES: usize = 32;

/// Generate a fresh session id from the operating system's entropy source.
///
/// The id is the leading [`SESSION_TOKEN_LEN`] characters of the RFC 4648
/// base32 encoding of the random bytes.
///
/// # Errors
/// Returns [`CollabError::TokenGeneration`] if the entropy source is unavailable.
pub fn generate_session_id() -> Result<SessionId, CollabError> {
    let mut bytes = [0u8; ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CollabError::TokenGeneration(e.to_string()))?;

    let mut token = BASE32_NOPAD.encode(&bytes);
    token.truncate(SESSION_TOKEN_LEN);
    Ok(SessionId::new(token))
}
