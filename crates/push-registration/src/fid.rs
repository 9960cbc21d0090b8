//! Installation identifier (FID) generation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use uuid::Uuid;

/// High nibble `0111` marking the identifier type.
const FID_TYPE_PREFIX: u8 = 0x70;

/// Generate a fresh 22 character installation identifier.
pub fn generate_fid() -> String {
    encode_fid(*Uuid::new_v4().as_bytes())
}

fn encode_fid(mut bytes: [u8; 16]) -> String {
    bytes[0] = FID_TYPE_PREFIX | (bytes[15] & 0x0f);
    URL_SAFE_NO_PAD.encode(bytes)
}
