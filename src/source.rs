//! Byte sources for the compressed catalog archive
//!
//! ZIP containers keep their directory at the end of the file, so the archive
//! reader needs a seekable input. Local files and in-memory buffers are used
//! as they are; network downloads and arbitrary streams are staged into a
//! temporary file first. The staging file is removed when its guard drops
//! unless the caller explicitly keeps it.

use crate::error::{BakeError, Result};
use std::fmt;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const STAGING_CHUNK: usize = 64 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the compressed archive comes from
pub enum ByteSource {
    /// Fetched over HTTP(S)
    Url(String),
    /// A local archive file
    Path(PathBuf),
    /// A fully buffered archive
    Memory(Vec<u8>),
    /// Any incremental, non-seekable byte stream
    Stream(Box<dyn Read + Send>),
}

impl ByteSource {
    /// Interpret a configured location as a URL or a local path
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            ByteSource::Url(location.to_string())
        } else if let Some(path) = location.strip_prefix("file://") {
            ByteSource::Path(PathBuf::from(path))
        } else {
            ByteSource::Path(PathBuf::from(location))
        }
    }

    /// Whether this source must be staged before the archive can be read
    pub fn needs_staging(&self) -> bool {
        matches!(self, ByteSource::Url(_) | ByteSource::Stream(_))
    }

    /// Human-readable location for diagnostics
    pub fn location(&self) -> String {
        match self {
            ByteSource::Url(url) => url.clone(),
            ByteSource::Path(path) => path.display().to_string(),
            ByteSource::Memory(bytes) => format!("<memory: {} bytes>", bytes.len()),
            ByteSource::Stream(_) => "<stream>".to_string(),
        }
    }

    /// Open the source as a seekable archive input, staging it if needed
    pub fn open(self, staging_dir: &Path) -> Result<OpenedSource> {
        let location = self.location();
        match self {
            ByteSource::Path(path) => {
                let file = File::open(&path).map_err(|e| BakeError::source_unavailable(&location, e))?;
                Ok(OpenedSource {
                    input: ArchiveInput::File(file),
                    staged: None,
                })
            }
            ByteSource::Memory(bytes) => Ok(OpenedSource {
                input: ArchiveInput::Memory(Cursor::new(bytes)),
                staged: None,
            }),
            ByteSource::Url(url) => {
                let response = fetch(&url)?;
                stage_and_open(response, &location, staging_dir)
            }
            ByteSource::Stream(reader) => stage_and_open(reader, &location, staging_dir),
        }
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteSource({})", self.location())
    }
}

/// A seekable archive input plus the staging file backing it, if any
pub struct OpenedSource {
    pub input: ArchiveInput,
    pub staged: Option<StagedArchive>,
}

/// Seekable input handed to the archive reader
pub enum ArchiveInput {
    File(File),
    Memory(Cursor<Vec<u8>>),
}

impl Read for ArchiveInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ArchiveInput::File(file) => file.read(buf),
            ArchiveInput::Memory(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for ArchiveInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            ArchiveInput::File(file) => file.seek(pos),
            ArchiveInput::Memory(cursor) => cursor.seek(pos),
        }
    }
}

/// Guard over the temporary copy of a non-seekable source.
///
/// Dropping the guard deletes the file.
#[derive(Debug)]
pub struct StagedArchive {
    file: NamedTempFile,
    bytes: u64,
}

impl StagedArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of bytes copied from the source
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    /// Delete the staging file, or keep it on disk and return its path
    pub fn release(self, keep: bool) -> Result<Option<PathBuf>> {
        if keep {
            let (_, path) = self.file.keep().map_err(|e| BakeError::Staging(e.error))?;
            info!("Kept staged archive at {}", path.display());
            Ok(Some(path))
        } else {
            self.file.close().map_err(BakeError::Staging)?;
            Ok(None)
        }
    }
}

fn fetch(url: &str) -> Result<reqwest::blocking::Response> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("bakery/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None::<Duration>)
        .build()
        .map_err(|e| BakeError::source_unavailable(url, e))?;

    info!("Downloading {}", url);
    let response = client
        .get(url)
        .send()
        .map_err(|e| BakeError::source_unavailable(url, e))?;

    if !response.status().is_success() {
        return Err(BakeError::source_unavailable(
            url,
            format!("HTTP {}", response.status()),
        ));
    }

    Ok(response)
}

fn stage_and_open(reader: impl Read, location: &str, staging_dir: &Path) -> Result<OpenedSource> {
    let staged = stage(reader, location, staging_dir)?;
    let file = staged.file.reopen().map_err(BakeError::Staging)?;
    Ok(OpenedSource {
        input: ArchiveInput::File(file),
        staged: Some(staged),
    })
}

/// Copy a stream into a new staging file in `dir`.
///
/// Read failures belong to the source, write failures to the local disk.
pub fn stage(mut reader: impl Read, location: &str, dir: &Path) -> Result<StagedArchive> {
    let mut file = tempfile::Builder::new()
        .prefix("bakery-")
        .suffix(".zip")
        .tempfile_in(dir)
        .map_err(BakeError::Staging)?;
    debug!("Staging {} into {}", location, file.path().display());

    let mut buf = vec![0u8; STAGING_CHUNK];
    let mut bytes = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(BakeError::source_unavailable(location, e)),
        };
        file.write_all(&buf[..n]).map_err(BakeError::Staging)?;
        bytes += n as u64;
    }
    file.flush().map_err(BakeError::Staging)?;

    info!("Staged {} bytes from {}", bytes, location);
    Ok(StagedArchive { file, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.served {
                return Err(std::io::Error::new(ErrorKind::ConnectionReset, "peer went away"));
            }
            self.served = true;
            buf[..4].copy_from_slice(b"PK\x03\x04");
            Ok(4)
        }
    }

    #[test]
    fn test_parse_location() {
        assert!(matches!(ByteSource::parse("https://example.com/a.zip"), ByteSource::Url(_)));
        assert!(matches!(ByteSource::parse("http://example.com/a.zip"), ByteSource::Url(_)));
        match ByteSource::parse("file:///tmp/a.zip") {
            ByteSource::Path(p) => assert_eq!(p, PathBuf::from("/tmp/a.zip")),
            other => panic!("Expected path, got {:?}", other),
        }
        assert!(matches!(ByteSource::parse("a.zip"), ByteSource::Path(_)));
    }

    #[test]
    fn test_needs_staging() {
        assert!(ByteSource::Url("https://x".into()).needs_staging());
        assert!(ByteSource::Stream(Box::new(std::io::empty())).needs_staging());
        assert!(!ByteSource::Memory(vec![]).needs_staging());
        assert!(!ByteSource::Path(PathBuf::from("a.zip")).needs_staging());
    }

    #[test]
    fn test_stage_copies_and_release_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let payload = vec![7u8; STAGING_CHUNK * 2 + 5];

        let staged = stage(Cursor::new(payload.clone()), "<test>", dir.path()).unwrap();
        assert_eq!(staged.len(), payload.len() as u64);
        assert_eq!(std::fs::read(staged.path()).unwrap(), payload);

        let path = staged.path().to_path_buf();
        assert_eq!(staged.release(false).unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_release_keep() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage(Cursor::new(b"abc".to_vec()), "<test>", dir.path()).unwrap();

        let kept = staged.release(true).unwrap().unwrap();
        assert_eq!(std::fs::read(&kept).unwrap(), b"abc");
    }

    #[test]
    fn test_read_failure_is_source_error_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();

        let err = stage(FailingReader { served: false }, "<flaky>", dir.path()).unwrap_err();
        assert!(matches!(err, BakeError::SourceUnavailable { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_path_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = ByteSource::Path(dir.path().join("missing.zip"));

        let err = source.open(dir.path()).err().unwrap();
        assert!(matches!(err, BakeError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_byte_source_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ByteSource>();
    }
}
