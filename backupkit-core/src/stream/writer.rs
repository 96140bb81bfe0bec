use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::delimited::write_block;
use super::format::PARTIAL_EXTENSION;
use super::integrity::IntegrityWriter;
use super::StreamMode;
use crate::error::{BackupError, BackupResult};
use crate::model::{BackupInfo, Frame};
use crate::proto::Message;

/// A destination file written under a `.partial` name until it is persisted.
///
/// Writes follow the write-to-temp-then-rename pattern:
///
/// 1. Write everything to `<name>.partial` next to the destination
/// 2. `fsync()` the partial file
/// 3. Rename it over the destination
/// 4. `fsync()` the parent directory
///
/// Dropping a `PartialFile` without calling [`PartialFile::persist`] deletes
/// the partial file, so an abandoned export never leaves a file behind that
/// looks like a finished backup.
#[derive(Debug)]
pub struct PartialFile {
    writer: Option<BufWriter<File>>,
    partial_path: PathBuf,
    final_path: PathBuf,
}

impl PartialFile {
    /// Creates (or truncates) the partial file for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::UnableToOpenStream`] if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> BackupResult<Self> {
        let final_path = path.as_ref().to_path_buf();
        let partial_path = partial_path_for(&final_path).ok_or_else(|| {
            BackupError::UnableToOpenStream {
                context: final_path.display().to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            }
        })?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&partial_path)
            .map_err(|source| BackupError::UnableToOpenStream {
                context: partial_path.display().to_string(),
                source,
            })?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            partial_path,
            final_path,
        })
    }

    /// Path of the in-progress file.
    #[must_use]
    pub fn partial_path(&self) -> &Path {
        &self.partial_path
    }

    /// Syncs the partial file and renames it to its final name.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from flushing, syncing or renaming. On error the
    /// partial file is removed.
    pub fn persist(mut self) -> BackupResult<PathBuf> {
        let Some(writer) = self.writer.take() else {
            return Err(BackupError::io(
                "persisting backup file",
                io::Error::other("file already persisted"),
            ));
        };
        let file = writer
            .into_inner()
            .map_err(|err| BackupError::io("flushing backup file", err.into_error()))?;
        file.sync_all()
            .map_err(|err| BackupError::io("syncing backup file", err))?;
        drop(file);

        fs::rename(&self.partial_path, &self.final_path).map_err(|err| {
            BackupError::io(
                format!(
                    "renaming '{}' to '{}'",
                    self.partial_path.display(),
                    self.final_path.display()
                ),
                err,
            )
        })?;
        sync_parent(&self.final_path)?;
        // Nothing left to clean up.
        self.partial_path = PathBuf::new();
        log::info!("wrote backup {}", self.final_path.display());
        Ok(self.final_path.clone())
    }
}

impl Write for PartialFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::other("file already persisted")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.partial_path.as_os_str().is_empty() {
            return;
        }
        drop(self.writer.take());
        if let Err(err) = fs::remove_file(&self.partial_path) {
            if err.kind() != io::ErrorKind::NotFound {
                log::warn!(
                    "failed to remove partial backup '{}': {err}",
                    self.partial_path.display()
                );
            }
        }
    }
}

fn partial_path_for(path: &Path) -> Option<PathBuf> {
    let mut name = path.file_name()?.to_os_string();
    name.push(".");
    name.push(PARTIAL_EXTENSION);
    Some(path.with_file_name(name))
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> BackupResult<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    let dir = File::open(parent).map_err(|err| {
        BackupError::io(
            format!("opening directory for sync '{}'", parent.display()),
            err,
        )
    })?;
    dir.sync_all()
        .map_err(|err| BackupError::io("syncing directory", err))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn sync_parent(_path: &Path) -> BackupResult<()> {
    Ok(())
}

/// A backup destination waiting for its header.
pub struct BackupWriter<W: Write> {
    sink: IntegrityWriter<W>,
}

impl BackupWriter<PartialFile> {
    /// Starts a backup file at `path`. The file only appears under that name
    /// once [`FrameWriter::finalize_file`] succeeds.
    ///
    /// # Errors
    ///
    /// Open errors, and key errors in encrypted mode.
    pub fn create(path: impl AsRef<Path>, mode: &StreamMode) -> BackupResult<Self> {
        Self::new(PartialFile::create(path)?, mode)
    }
}

impl<W: Write> BackupWriter<W> {
    /// Wraps any sink. Encrypted mode writes the container prefix immediately.
    ///
    /// # Errors
    ///
    /// Key and I/O errors from the integrity layer.
    pub fn new(sink: W, mode: &StreamMode) -> BackupResult<Self> {
        Ok(Self {
            sink: IntegrityWriter::new(sink, mode)?,
        })
    }

    /// Writes the header block and returns the frame writer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the block cannot be written.
    pub fn write_header(mut self, info: &BackupInfo) -> BackupResult<FrameWriter<W>> {
        write_block(&info.encode_to_vec(), &mut self.sink)
            .map_err(|err| BackupError::io("writing backup header", err))?;
        Ok(FrameWriter {
            sink: self.sink,
            frames_written: 0,
            scratch: Vec::new(),
        })
    }
}

/// Writes frame blocks after the header.
///
/// [`FrameWriter::finalize`] consumes the writer, so nothing can be written
/// after the tag.
pub struct FrameWriter<W: Write> {
    sink: IntegrityWriter<W>,
    frames_written: u64,
    scratch: Vec<u8>,
}

impl<W: Write> FrameWriter<W> {
    /// Appends one frame.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the block cannot be written.
    pub fn write_frame(&mut self, frame: &Frame) -> BackupResult<()> {
        self.scratch.clear();
        frame.encode(&mut self.scratch);
        write_block(&self.scratch, &mut self.sink).map_err(|err| {
            BackupError::io(format!("writing frame {}", self.frames_written), err)
        })?;
        self.frames_written += 1;
        Ok(())
    }

    /// Number of frames written.
    #[must_use]
    pub const fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Writes the tag (encrypted mode), flushes and returns the sink.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the final write or flush.
    pub fn finalize(self) -> BackupResult<W> {
        log::debug!("finalizing backup stream after {} frames", self.frames_written);
        self.sink.finish()
    }
}

impl FrameWriter<PartialFile> {
    /// Finalizes the stream and moves the file to its destination path.
    ///
    /// # Errors
    ///
    /// See [`FrameWriter::finalize`] and [`PartialFile::persist`].
    pub fn finalize_file(self) -> BackupResult<PathBuf> {
        self.finalize()?.persist()
    }
}
