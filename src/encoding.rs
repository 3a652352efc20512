//! Content codings the harness can decode, and Accept-Encoding lists.

use std::fmt;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Brotli,
    Gzip,
    Deflate,
}

impl ContentCoding {
    pub fn token(&self) -> &'static str {
        match self {
            ContentCoding::Brotli => "br",
            ContentCoding::Gzip => "gzip",
            ContentCoding::Deflate => "deflate",
        }
    }

    /// Unknown tokens (and `identity`) are not content codings we can decode.
    pub fn from_token(token: &str) -> Option<ContentCoding> {
        match token.trim().to_ascii_lowercase().as_str() {
            "br" => Some(ContentCoding::Brotli),
            "gzip" | "x-gzip" => Some(ContentCoding::Gzip),
            "deflate" => Some(ContentCoding::Deflate),
            _ => None,
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
        let mut decoded = Vec::new();
        match self {
            ContentCoding::Brotli => {
                brotli::Decompressor::new(data, 4096).read_to_end(&mut decoded)?;
            }
            ContentCoding::Gzip => {
                flate2::read::GzDecoder::new(data).read_to_end(&mut decoded)?;
            }
            ContentCoding::Deflate => {
                // servers disagree on whether deflate means zlib-wrapped or raw
                if flate2::read::ZlibDecoder::new(data).read_to_end(&mut decoded).is_err() {
                    decoded.clear();
                    flate2::read::DeflateDecoder::new(data).read_to_end(&mut decoded)?;
                }
            }
        }
        Ok(decoded)
    }
}

impl fmt::Display for ContentCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// An Accept-Encoding value exactly as it goes on the wire. May hold
/// tokens the harness cannot decode, such as `unknown`.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEncoding(String);

impl AcceptEncoding {
    pub fn new(value: &str) -> AcceptEncoding {
        AcceptEncoding(value.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodable codings in the order they were listed. Weights of `q=0` exclude a coding.
    pub fn supported(&self) -> Vec<ContentCoding> {
        self.0
            .split(',')
            .filter_map(|item| {
                let mut parts = item.split(';');
                let coding = ContentCoding::from_token(parts.next()?)?;
                let refused = parts.any(|p| {
                    p.trim()
                        .strip_prefix("q=")
                        .and_then(|q| q.trim().parse::<f32>().ok())
                        .map(|q| q == 0.0)
                        .unwrap_or(false)
                });
                (!refused).then_some(coding)
            })
            .collect()
    }

    pub fn allows(&self, coding: ContentCoding) -> bool {
        self.supported().contains(&coding)
    }
}

#[cfg(test)]
pub(crate) fn encode(coding: ContentCoding, data: &[u8]) -> Vec<u8> {
    use std::io::Write;

    match coding {
        ContentCoding::Brotli => {
            let mut out = vec![];
            {
                let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
                writer.write_all(data).unwrap();
            }
            out
        }
        ContentCoding::Gzip => {
            let mut e = flate2::write::GzEncoder::new(vec![], flate2::Compression::default());
            e.write_all(data).unwrap();
            e.finish().unwrap()
        }
        ContentCoding::Deflate => {
            let mut e = flate2::write::ZlibEncoder::new(vec![], flate2::Compression::default());
            e.write_all(data).unwrap();
            e.finish().unwrap()
        }
    }
}
