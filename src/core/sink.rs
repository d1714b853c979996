// Byte sinks a table streams its rows into: plain file, gzip file, or caller-supplied writer.
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "gzip")]
use flate2::{Compression, write::GzEncoder};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenMode {
    Truncate,
    Append,
}

enum Inner {
    Plain(BufWriter<File>),
    #[cfg(feature = "gzip")]
    Gzip(GzEncoder<BufWriter<File>>),
    Custom(Box<dyn Write + Send>),
}

pub struct Sink {
    inner: Inner,
    path: Option<PathBuf>,
}

impl Sink {
    /// Opens `path` as a plain text sink.
    pub fn create(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = open_file(&path, mode)?;
        Ok(Self {
            inner: Inner::Plain(BufWriter::new(file)),
            path: Some(path),
        })
    }

    /// Opens `path` behind a gzip encoder. Appending adds a new gzip member.
    #[cfg(feature = "gzip")]
    pub fn create_gzip(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = open_file(&path, mode)?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        Ok(Self {
            inner: Inner::Gzip(encoder),
            path: Some(path),
        })
    }

    #[cfg(not(feature = "gzip"))]
    pub fn create_gzip(path: impl AsRef<Path>, _mode: OpenMode) -> Result<Self, Error> {
        Err(Error::new(ErrorKind::Unsupported)
            .with_message("compiled without compression support")
            .with_hint("Rebuild with the `gzip` feature or disable compression.")
            .with_path(path.as_ref()))
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Inner::Custom(Box::new(writer)),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_compressed(&self) -> bool {
        match &self.inner {
            #[cfg(feature = "gzip")]
            Inner::Gzip(_) => true,
            _ => false,
        }
    }

    /// Flushes buffered bytes, writes the gzip trailer if any, and releases the file.
    pub fn finish(self) -> Result<(), Error> {
        let path = self.path;
        let result = match self.inner {
            Inner::Plain(mut writer) => writer.flush(),
            #[cfg(feature = "gzip")]
            Inner::Gzip(encoder) => encoder.finish().and_then(|mut writer| writer.flush()),
            Inner::Custom(mut writer) => writer.flush(),
        };
        result.map_err(|err| {
            let mut error = Error::new(ErrorKind::Io)
                .with_message("failed to close output")
                .with_source(err);
            if let Some(path) = path {
                error = error.with_path(path);
            }
            error
        })
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("path", &self.path)
            .field("compressed", &self.is_compressed())
            .finish()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Plain(writer) => writer.write(buf),
            #[cfg(feature = "gzip")]
            Inner::Gzip(encoder) => encoder.write(buf),
            Inner::Custom(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Inner::Plain(writer) => writer.flush(),
            #[cfg(feature = "gzip")]
            Inner::Gzip(encoder) => encoder.flush(),
            Inner::Custom(writer) => writer.flush(),
        }
    }
}

fn open_file(path: &Path, mode: OpenMode) -> Result<File, Error> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        OpenMode::Truncate => options.write(true).truncate(true),
        OpenMode::Append => options.append(true),
    };
    options.open(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("could not open output file")
            .with_path(path)
            .with_source(err)
    })
}
