//! File system and transfer capabilities used by the pipeline.
//!
//! The runner never touches `std::fs` or spawns processes itself; it goes
//! through [`FileSystem`] and [`Transport`] so tests can swap either one.

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// File operations needed to build a staging tree.
pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Lists the entries directly inside `dir`, not recursing.
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Lists every file and directory below `dir`, `dir` itself excluded.
    fn walk(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Absolute form of an existing `path` with symlinks and `..` resolved.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Writes `content` to `path`, replacing any existing file.
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Creates `path` and all missing parents.
    fn ensure_dir(&self, path: &Path) -> Result<()>;

    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Copies a file, or a directory with everything below it, to `dest`.
    fn copy_recursive(&self, source: &Path, dest: &Path) -> Result<()>;
}

/// [`FileSystem`] backed by the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(Error::IoError)?;
    }
    fs::copy(source, dest).map(|_| ()).map_err(Error::IoError)
}

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            entries.push(entry?.path());
        }
        Ok(entries)
    }

    fn walk(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::IoError(e.into()))?;
            entries.push(entry.into_path());
        }
        Ok(entries)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).map_err(Error::IoError)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(Error::IoError)
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::IoError)?;
        }
        fs::write(path, content).map_err(Error::IoError)
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(Error::IoError)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).map_err(Error::IoError)
    }

    fn copy_recursive(&self, source: &Path, dest: &Path) -> Result<()> {
        if !source.is_dir() {
            debug!("Copying file: {} -> {}", source.display(), dest.display());
            return copy_file(source, dest);
        }

        for entry in WalkDir::new(source) {
            let entry = entry.map_err(|e| Error::IoError(e.into()))?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| Error::ConfigError(e.to_string()))?;
            let target = dest.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(Error::IoError)?;
            } else {
                debug!("Copying file: {} -> {}", entry.path().display(), target.display());
                copy_file(entry.path(), &target)?;
            }
        }
        Ok(())
    }
}

/// Captured result of one transfer command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl TransferOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs the external command that ships the staging tree to its destination.
pub trait Transport {
    /// Runs `program` with `args`, blocking until it exits.
    ///
    /// Only a failure to start the process is an error; a non-zero exit is
    /// reported through [`TransferOutput::code`].
    fn run(&self, program: &str, args: &[String]) -> Result<TransferOutput>;
}

/// [`Transport`] that spawns a local process and captures its output.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandTransport;

impl CommandTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for CommandTransport {
    fn run(&self, program: &str, args: &[String]) -> Result<TransferOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(Error::IoError)?;

        Ok(TransferOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
