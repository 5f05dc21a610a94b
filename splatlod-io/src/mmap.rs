//! Memory-mapped access to large PLY sources
//!
//! With the `io-mmap` feature the whole source is mapped read-only so records
//! can be located by offset through the codec. Small files, unsupported
//! platforms and mapping failures fall back to buffered streaming.

#[cfg(feature = "io-mmap")]
use memmap2::Mmap;
use splatlod_core::Result;
use std::fs::File;
use std::path::Path;

/// Files smaller than this are streamed; mapping overhead dominates below it
pub const MIN_MMAP_SIZE: u64 = 64 * 1024;

/// Read-only memory map of a source file
pub struct MmapReader {
    #[cfg(feature = "io-mmap")]
    mmap: Mmap,
    #[cfg(not(feature = "io-mmap"))]
    _phantom: std::marker::PhantomData<()>,
}

impl MmapReader {
    /// Map `file` if memory mapping is available and the file is at least
    /// `MIN_MMAP_SIZE` bytes
    ///
    /// Returns `None` when the caller should stream instead.
    pub fn new(file: &File) -> Result<Option<Self>> {
        #[cfg(feature = "io-mmap")]
        {
            if !Self::is_supported() {
                return Ok(None);
            }

            let metadata = file.metadata()?;
            if metadata.len() < MIN_MMAP_SIZE {
                return Ok(None);
            }

            // The source must not be truncated by another process while mapped
            let mmap = unsafe {
                match Mmap::map(file) {
                    Ok(mmap) => mmap,
                    Err(e) => {
                        tracing::debug!("memory mapping failed, streaming instead: {}", e);
                        return Ok(None);
                    }
                }
            };

            Ok(Some(Self { mmap }))
        }

        #[cfg(not(feature = "io-mmap"))]
        {
            let _ = file;
            Ok(None)
        }
    }

    /// Open and map the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let file = File::open(path)?;
        Self::new(&file)
    }

    /// Check if memory mapping is supported on this platform
    pub fn is_supported() -> bool {
        #[cfg(feature = "io-mmap")]
        {
            cfg!(any(unix, windows))
        }

        #[cfg(not(feature = "io-mmap"))]
        {
            false
        }
    }

    /// The mapped file contents
    pub fn as_slice(&self) -> &[u8] {
        #[cfg(feature = "io-mmap")]
        {
            &self.mmap
        }

        #[cfg(not(feature = "io-mmap"))]
        {
            &[]
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Check whether a file would be memory mapped, based on size and platform support
pub fn should_use_mmap<P: AsRef<Path>>(path: P) -> bool {
    if !MmapReader::is_supported() {
        return false;
    }

    std::fs::metadata(path)
        .map(|metadata| metadata.len() >= MIN_MMAP_SIZE)
        .unwrap_or(false)
}
