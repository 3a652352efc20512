use std::path::Path;
use phf::phf_map;
use crate::error::CheckError;

static MIMETYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "html" => "text/html",
    "css" => "text/css",
    "js" => "application/javascript",
    "svg" => "image/svg+xml",
    "woff2" => "font/woff2",
    "ico" => "image/x-icon",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "jpg" => "image/jpeg",
    "txt" => "text/plain",
};

/// Reads a reference file. The bytes are compared as-is against what the server sends.
pub fn load_fixture(dir: &Path, name: &str) -> Result<Vec<u8>, CheckError> {
    let path = dir.join(name);
    std::fs::read(&path).map_err(|source| CheckError::Fixture { path, source })
}

/// Content type a server is expected to send for a fixture, by extension.
pub fn mimetype(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_string_lossy().to_lowercase();
    MIMETYPES.get(ext.as_str()).copied()
}
