use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

/// Bytes of entropy in a verification token.
pub const TOKEN_BYTES: usize = 32;

/// Source of verification tokens.
pub trait TokenSource: Send + Sync {
    fn generate(&self) -> String;
}

/// Draws tokens straight from the operating system CSPRNG and encodes them
/// URL-safe, so they can be placed in a query string as is.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn generate(&self) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Base64UrlUnpadded::encode_string(&bytes)
    }
}
