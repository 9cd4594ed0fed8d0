use std::fs;
use std::path::Path;

use miette::Result;

use crate::error;
use crate::runtime::MEMORY_MAX;

/// An assembled program image: an origin address plus the words to load there.
///
/// On disk an image is a stream of big-endian 16-bit words. The first word is
/// the origin; the remaining words are placed consecutively in memory starting
/// at that address.
#[derive(Debug, Clone)]
pub struct Image {
    pub origin: u16,
    pub words: Vec<u16>,
}

impl Image {
    /// Read and decode an image file.
    pub fn read_from(path: &Path) -> Result<Image> {
        let bytes = fs::read(path).map_err(|err| error::load_failed(path, err))?;
        Self::from_bytes(&bytes).ok_or_else(|| error::load_no_origin(path))
    }

    /// Decode an image from raw bytes. Returns `None` if there is no origin word.
    ///
    /// Words that would land past the end of addressable memory are dropped,
    /// and a trailing odd byte is ignored.
    pub fn from_bytes(bytes: &[u8]) -> Option<Image> {
        let origin = u16::from_be_bytes([*bytes.first()?, *bytes.get(1)?]);
        let words = bytes[2..]
            .chunks_exact(2)
            .take(MEMORY_MAX - origin as usize)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Some(Image { origin, words })
    }

    /// Payload size as loaded, in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.words.len() * 2
    }
}
