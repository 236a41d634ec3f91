use std::io::Read;

use flate2::read::{DeflateDecoder, MultiGzDecoder};

use crate::fetch::FetchError;

/// Decodes a response body according to its `Content-Encoding` header value.
///
/// An absent (empty) or `identity` encoding passes the body through, `gzip`
/// inflates a (possibly multi-member) gzip stream and `deflate` a raw deflate
/// stream. Invalid UTF-8 sequences are replaced.
pub fn decode_http_body(body: &[u8], content_encoding: &str) -> Result<String, FetchError> {
    let encoding = content_encoding.trim().to_ascii_lowercase();
    let decoded = match encoding.as_str() {
        "" | "identity" => return Ok(String::from_utf8_lossy(body).into_owned()),
        "gzip" | "x-gzip" => inflate(MultiGzDecoder::new(body), &encoding)?,
        "deflate" => inflate(DeflateDecoder::new(body), &encoding)?,
        _ => return Err(FetchError::UnsupportedEncoding(content_encoding.to_owned())),
    };
    Ok(String::from_utf8_lossy(&decoded).into_owned())
}

fn inflate(mut reader: impl Read, encoding: &str) -> Result<Vec<u8>, FetchError> {
    let mut decoded = Vec::new();
    reader
        .read_to_end(&mut decoded)
        .map_err(|source| FetchError::Decode {
            encoding: encoding.to_owned(),
            source,
        })?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, GzEncoder};
    use flate2::Compression;
    use std::io::Write;

    const PAGE: &str = "<html><body><span id=\"price\">123.45</span></body></html>";

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn plain_bodies_pass_through() {
        assert_eq!(decode_http_body(PAGE.as_bytes(), "").unwrap(), PAGE);
        assert_eq!(decode_http_body(PAGE.as_bytes(), "identity").unwrap(), PAGE);
    }

    #[test]
    fn gzip_body_is_inflated() {
        assert_eq!(decode_http_body(&gzip(PAGE.as_bytes()), "gzip").unwrap(), PAGE);
        assert_eq!(decode_http_body(&gzip(PAGE.as_bytes()), " GZIP ").unwrap(), PAGE);
    }

    #[test]
    fn deflate_body_is_inflated() {
        assert_eq!(decode_http_body(&deflate(PAGE.as_bytes()), "deflate").unwrap(), PAGE);
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(matches!(
            decode_http_body(PAGE.as_bytes(), "br"),
            Err(FetchError::UnsupportedEncoding(encoding)) if encoding == "br"
        ));
    }

    #[test]
    fn corrupt_gzip_is_a_decode_error() {
        assert!(matches!(
            decode_http_body(b"definitely not gzip", "gzip"),
            Err(FetchError::Decode { encoding, .. }) if encoding == "gzip"
        ));
    }
}
