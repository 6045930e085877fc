//! URL-safe base64 without padding ("base64w").
//!
//! Output never carries padding. Input is tolerant: trailing `=` padding
//! and surrounding ASCII whitespace are accepted and ignored.

use base64ct::{Base64UrlUnpadded, Encoding};

use crate::KeyrollError;

pub fn encode(bytes: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(bytes)
}

pub fn decode(input: &str) -> Result<Vec<u8>, KeyrollError> {
    let input = input
        .trim_matches(|c: char| c.is_ascii_whitespace())
        .trim_end_matches('=');
    Base64UrlUnpadded::decode_vec(input).map_err(|_| KeyrollError::FormatError)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};

    #[test]
    fn no_padding_on_output() {
        assert_eq!(encode(b"a"), "YQ");
        assert_eq!(encode(b"ab"), "YWI");
        assert_eq!(encode(b"abc"), "YWJj");
    }

    #[test]
    fn url_safe_alphabet() {
        assert_eq!(encode(&[0xfb, 0xff]), "-_8");
        assert_eq!(decode("-_8").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn tolerates_padding_and_whitespace() {
        assert_eq!(decode("YQ==").unwrap(), b"a");
        assert_eq!(decode("  YWI=\n").unwrap(), b"ab");
        assert_eq!(decode("YWJj").unwrap(), b"abc");
    }

    #[test]
    fn rejects_standard_alphabet() {
        assert!(decode("+/8").is_err());
    }

    #[test]
    fn round_trips() {
        let data: Vec<u8> = (0u8..=255).collect();
        assert_eq!(decode(&encode(&data)).unwrap(), data);
    }
}
