use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Destination for serialized trace output.
pub trait Writer {
    fn write(&mut self, text: &str) -> Result<(), Error>;
}

/// Writes to stdout, one trailing newline per write.
#[derive(Debug, Default)]
pub struct ConsoleWriter;

impl Writer for ConsoleWriter {
    fn write(&mut self, text: &str) -> Result<(), Error> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{text}")?;
        stdout.flush()?;
        Ok(())
    }
}

/// Replaces the contents of a file, creating parent directories as needed.
#[derive(Debug)]
pub struct FileWriter {
    path: PathBuf,
}

impl FileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Writer for FileWriter {
    fn write(&mut self, text: &str) -> Result<(), Error> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&self.path, text)
        };
        write().map_err(|source| Error::WriteFailed {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), bytes = text.len(), "wrote trace");
        Ok(())
    }
}
