//! Writing the finished byte blob to the destination path.

use opustuck_core::{MemoryBlob, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Bytes written to disk per call.
pub const WRITE_CHUNK_BYTES: usize = 64 * 1024;

/// Write the blob to `path` in [`WRITE_CHUNK_BYTES`] windows.
///
/// The file is only ever created from a complete blob, so the destination
/// either ends up whole or is never created at all. Cancellation is not
/// observed here.
pub fn write_blob(blob: &MemoryBlob, path: &Path) -> Result<()> {
    debug!(bytes = blob.size(), path = %path.display(), "writing output file");

    let mut file = File::create(path)?;

    let mut buffer = vec![0u8; WRITE_CHUNK_BYTES];
    let mut offset = 0u64;
    let length = blob.size();
    while offset < length {
        let chunk_size = (length - offset).min(WRITE_CHUNK_BYTES as u64) as usize;
        blob.read_at(offset, &mut buffer[..chunk_size])?;
        file.write_all(&buffer[..chunk_size])?;
        offset += chunk_size as u64;
    }

    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_blob_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.opus");

        // Larger than one chunk so the windowing code runs
        let payload: Vec<u8> = (0..(WRITE_CHUNK_BYTES * 2 + 17))
            .map(|index| (index % 251) as u8)
            .collect();
        let blob = MemoryBlob::from(payload.clone());

        write_blob(&blob, &path).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), payload);
    }

    #[test]
    fn test_write_empty_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.opus");
        write_blob(&MemoryBlob::new(), &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap().len(), 0);
    }
}
