//! Line readers for saved LDIF exports and command output.
//!
//! Every reader here splits on `\n`, drops one trailing `\r` and decodes the
//! bytes lossily. Exports are expected to be UTF-8, but a stray Latin-1 byte
//! in a `gecos` value yields a replacement character instead of aborting the
//! report, whichever backend happens to read the file.
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use memmap2::Mmap;

/// Exports at or above this size are memory-mapped instead of buffered.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

/// Lazy line stream shared by every group data source.
pub type LineIter = Box<dyn Iterator<Item = io::Result<String>> + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Buffered,
    Mapped,
}

impl Backend {
    fn for_size(len: u64, threshold: u64) -> Self {
        if len >= threshold {
            Backend::Mapped
        } else {
            Backend::Buffered
        }
    }
}

/// Open an export file, memory-mapping it when it is at least
/// `mmap_threshold` bytes long.
pub fn open_export<P: AsRef<Path>>(path: P, mmap_threshold: u64) -> Result<LineIter> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let meta = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?;
    let backend = if meta.is_file() {
        Backend::for_size(meta.len(), mmap_threshold)
    } else {
        Backend::Buffered
    };
    debug!("reading {} ({:?})", path.display(), backend);
    match backend {
        Backend::Buffered => Ok(Box::new(ReadLines::new(file))),
        Backend::Mapped => {
            // The export is only read; concurrent truncation by another process is not handled.
            let mmap = unsafe { Mmap::map(&file) }
                .with_context(|| format!("mmap {}", path.display()))?;
            Ok(Box::new(MappedLines { mmap, offset: 0 }))
        }
    }
}

/// Lines of any byte stream, e.g. a file or a child's stdout.
pub struct ReadLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: Read> ReadLines<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }
}

impl<R: Read> Iterator for ReadLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => Some(Ok(decode_line(&self.buf))),
            Err(e) => Some(Err(e)),
        }
    }
}

struct MappedLines {
    mmap: Mmap,
    offset: usize,
}

impl Iterator for MappedLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.mmap.get(self.offset..).filter(|r| !r.is_empty())?;
        let end = memchr::memchr(b'\n', rest).map_or(rest.len(), |i| i + 1);
        self.offset += end;
        Some(Ok(decode_line(&rest[..end])))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
