use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use tracing_subscriber::{fmt, fmt::MakeWriter, prelude::*, EnvFilter};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::{errors::Error, Result};

/// Initialize logging for the bot.
///
/// Console output starts right away so that configuration errors are logged.
/// The file layer stays silent until [`LogHandle::attach_file`] is called.
///
/// Default filter: info for dependencies, debug for our crates.
/// Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<LogHandle> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,sfbot=debug,sfbot_core=debug,sfbot_seafile=debug,sfbot_telegram=debug,{}=debug",
            service_name.replace('-', "_")
        ))
    });

    let sink = FileSink::default();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_ansi(true))
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(sink.clone()),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {e}")))?;

    Ok(LogHandle { sink })
}

/// Returned by [`init`]; turns on the file layer once the log settings are known.
#[derive(Clone, Debug)]
pub struct LogHandle {
    sink: FileSink,
}

impl LogHandle {
    pub fn attach_file(&self, log_dir: &Path, rotation_bytes: u64) -> Result<()> {
        let writer = RotatingFileWriter::open(log_dir, rotation_bytes)?;
        self.sink.attach(writer);
        Ok(())
    }
}

/// `MakeWriter` for the file layer. Events are dropped while no file is attached.
#[derive(Clone, Debug, Default)]
pub struct FileSink {
    inner: Arc<Mutex<Option<RotatingFileWriter>>>,
}

impl FileSink {
    pub fn attach(&self, writer: RotatingFileWriter) {
        *self.lock() = Some(writer);
    }

    fn lock(&self) -> MutexGuard<'_, Option<RotatingFileWriter>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct FileSinkWriter<'a> {
    guard: MutexGuard<'a, Option<RotatingFileWriter>>,
}

impl<'a> MakeWriter<'a> for FileSink {
    type Writer = FileSinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        FileSinkWriter { guard: self.lock() }
    }
}

impl Write for FileSinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.guard.as_mut() {
            Some(w) => w.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.guard.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Size-rotated log file.
///
/// Writes go straight to `<dir>/<timestamp>.log`, unbuffered. Once the file reaches `max_bytes` it
/// is closed, compressed into `<timestamp>.log.zip` (the plain file is
/// removed) and a fresh file is opened.
#[derive(Debug)]
pub struct RotatingFileWriter {
    dir: PathBuf,
    max_bytes: u64,
    current: File,
    current_path: PathBuf,
    written: u64,
}

impl RotatingFileWriter {
    pub fn open(dir: &Path, max_bytes: u64) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let (current, current_path) = open_new_file(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            max_bytes: max_bytes.max(1),
            current,
            current_path,
            written: 0,
        })
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.current.flush()?;
        let finished = self.current_path.clone();

        let (next, next_path) = open_new_file(&self.dir).map_err(into_io)?;
        self.current = next;
        self.current_path = next_path;
        self.written = 0;

        compress_and_remove(&finished)
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.current.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.current.flush()
    }
}

fn open_new_file(dir: &Path) -> Result<(File, PathBuf)> {
    let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S_%6f").to_string();
    let mut path = dir.join(format!("{stamp}.log"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stamp}.{n}.log"));
        n += 1;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

fn compress_and_remove(path: &Path) -> io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "log".to_string());
    let zip_path = path.with_file_name(format!("{name}.zip"));

    let mut zip = ZipWriter::new(File::create(&zip_path)?);
    zip.start_file(
        name,
        FileOptions::default().compression_method(CompressionMethod::Deflated),
    )
    .map_err(zip_err)?;
    io::copy(&mut File::open(path)?, &mut zip)?;
    zip.finish().map_err(zip_err)?;

    fs::remove_file(path)
}

fn zip_err(e: zip::result::ZipError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

fn into_io(e: Error) -> io::Error {
    match e {
        Error::Io(io) => io,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"))
    }

    fn entries(dir: &Path, suffix: &str) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.to_string_lossy().ends_with(suffix))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn writes_into_a_timestamped_file() {
        let dir = tmp("sfbot-log");
        let mut w = RotatingFileWriter::open(&dir, 1024).unwrap();
        w.write_all(b"hello\n").unwrap();

        let path = w.current_path().to_path_buf();
        assert!(path.to_string_lossy().ends_with(".log"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn rotates_and_compresses_past_the_size_limit() {
        let dir = tmp("sfbot-rot");
        let mut w = RotatingFileWriter::open(&dir, 10).unwrap();
        let first = w.current_path().to_path_buf();

        w.write_all(b"0123456789").unwrap();
        w.write_all(b"abc\n").unwrap();
        w.flush().unwrap();

        assert!(!first.exists(), "rotated file should be removed");
        let zips = entries(&dir, ".log.zip");
        assert_eq!(zips.len(), 1);

        let mut archive = zip::ZipArchive::new(File::open(&zips[0]).unwrap()).unwrap();
        let mut inner = archive.by_index(0).unwrap();
        let mut content = String::new();
        inner.read_to_string(&mut content).unwrap();
        assert_eq!(content, "0123456789");

        assert_eq!(fs::read_to_string(w.current_path()).unwrap(), "abc\n");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn oversized_single_write_does_not_rotate_an_empty_file() {
        let dir = tmp("sfbot-big");
        let mut w = RotatingFileWriter::open(&dir, 4).unwrap();
        w.write_all(b"a much longer line\n").unwrap();
        w.flush().unwrap();
        assert!(entries(&dir, ".zip").is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn events_reach_disk_without_flush() {
        let dir = tmp("sfbot-sub");
        let sink = FileSink::default();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(sink.clone()),
        );
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::error!("dropped before the file is attached");

        let handle = LogHandle { sink: sink.clone() };
        handle.attach_file(&dir, 1024 * 1024).unwrap();
        tracing::error!("fatal error: something broke");

        let files = entries(&dir, ".log");
        assert_eq!(files.len(), 1);
        let content = fs::read_to_string(&files[0]).unwrap();
        assert!(content.contains("fatal error: something broke"), "{content}");
        assert!(!content.contains("dropped before"));
        let _ = fs::remove_dir_all(&dir);
    }
}
