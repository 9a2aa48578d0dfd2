//! Output file that removes itself unless the extraction commits it.

use std::fs::{self, File};
use std::io::{BufWriter, Error as IoError, Result as IoResult, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Write buffer size for extracted audio.
const OUTPUT_BUFFER_SIZE: usize = 64 * 1024;

/// A buffered output file that is deleted when dropped without
/// [`persist`](OutputFile::persist).
pub(crate) struct OutputFile {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
}

impl OutputFile {
    /// Create (or truncate) the file at `path`.
    pub(crate) fn create(path: &Path) -> IoResult<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Some(BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, file)),
            path: path.to_path_buf(),
        })
    }

    /// Flush, close and keep the file.
    pub(crate) fn persist(mut self) -> IoResult<PathBuf> {
        self.writer()?.flush()?;
        self.writer = None;
        Ok(std::mem::take(&mut self.path))
    }

    fn writer(&mut self) -> IoResult<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| IoError::other("output file is already closed"))
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.writer()?.flush()
    }
}

impl Seek for OutputFile {
    fn seek(&mut self, position: SeekFrom) -> IoResult<u64> {
        self.writer()?.seek(position)
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        // Close the handle before unlinking so removal also works on Windows.
        drop(writer);
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("removed partial output {}", self.path.display()),
            Err(error) => log::warn!(
                "failed to remove partial output {}: {error}",
                self.path.display()
            ),
        }
    }
}
