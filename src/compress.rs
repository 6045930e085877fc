//! Optional gzip/zlib body compression for the pipelines.

use std::io::{Read, Write};

use crate::facade::Compression;
use crate::KeyrollError;

pub(crate) fn compress(format: Compression, data: &[u8]) -> Result<Vec<u8>, KeyrollError> {
    match format {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data)?;
            Ok(enc.finish()?)
        }
        Compression::Zlib => {
            let mut enc =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data)?;
            Ok(enc.finish()?)
        }
    }
}

pub(crate) fn decompress(format: Compression, data: &[u8]) -> Result<Vec<u8>, KeyrollError> {
    let mut out = Vec::new();
    match format {
        Compression::None => out.extend_from_slice(data),
        Compression::Gzip => {
            flate2::read::GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|_| KeyrollError::FormatError)?;
        }
        Compression::Zlib => {
            flate2::read::ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|_| KeyrollError::FormatError)?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let data = b"a body that is long enough to shrink when repeated ".repeat(8);
        for format in [Compression::None, Compression::Gzip, Compression::Zlib] {
            let packed = compress(format, &data).unwrap();
            assert_eq!(decompress(format, &packed).unwrap(), data);
        }
    }

    #[test]
    fn rejects_garbage_streams() {
        assert!(decompress(Compression::Gzip, b"not a gzip stream").is_err());
        assert!(decompress(Compression::Zlib, b"not a zlib stream").is_err());
    }
}
