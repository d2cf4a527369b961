//! Board files.
//!
//! Two interchangeable formats carry the same [`Scene`]: a structured JSON
//! document (`.jpcb`) and a compact tagged-record stream (`.pcb`). Saves go
//! through a temporary file in the destination directory and are renamed
//! into place, so a failed save never leaves a half-written board behind.

pub mod binary;
pub mod json;

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

pub use binary::DecodeError;

use crate::config::ConfigError;
use crate::graph::{Board, GraphError, LinkId};
use crate::registry::{IdKind, RegistryError};
use crate::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Structured,
    Binary,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Structured => "jpcb",
            Format::Binary => "pcb",
        }
    }

    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("jpcb") {
            Some(Format::Structured)
        } else if ext.eq_ignore_ascii_case("pcb") {
            Some(Format::Binary)
        } else {
            None
        }
    }

    /// Guess from content: binary streams open with a magic header.
    pub fn sniff(bytes: &[u8]) -> Format {
        if bytes.starts_with(binary::MAGIC) {
            Format::Binary
        } else {
            Format::Structured
        }
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("Malformed binary stream: {0}")]
    Stream(#[from] DecodeError),

    #[error("Invalid {kind} id {id}")]
    InvalidId { kind: &'static str, id: i32 },

    #[error("Duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: i32 },

    #[error("Link {link} references missing point {point}")]
    OrphanLink { link: i32, point: i32 },

    #[error("No {kind} ids left after the largest stored one")]
    IdOverflow { kind: &'static str },

    #[error("Invalid side code {0}")]
    InvalidSide(i32),

    #[error("Stored {kind} counter is negative ({value})")]
    NegativeCounter { kind: IdKind, value: i32 },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(GraphError),
}

impl From<GraphError> for LoadError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::DuplicatePoint(id) => LoadError::DuplicateId { kind: "point", id: id.0 },
            GraphError::DuplicateLink(id) => LoadError::DuplicateId { kind: "link", id: id.0 },
            GraphError::DuplicateComponent(id) => LoadError::DuplicateId {
                kind: "component",
                id: id.0,
            },
            GraphError::DuplicateNote(id) => LoadError::DuplicateId { kind: "note", id: id.0 },
            GraphError::Registry(err) => LoadError::Registry(err),
            other => LoadError::Graph(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Link {0} is missing an endpoint")]
    UnconnectedLink(LinkId),

    #[error("Image path {} is not valid UTF-8", .0.display())]
    NonUtf8ImagePath(PathBuf),

    #[error("Failed to encode document: {0}")]
    Document(#[from] serde_json::Error),
}

pub fn encode(scene: &Scene, format: Format) -> Result<Vec<u8>, SaveError> {
    match format {
        Format::Structured => Ok(json::encode(scene)?),
        Format::Binary => Ok(binary::encode(scene)),
    }
}

pub fn decode(bytes: &[u8], format: Format) -> Result<Scene, LoadError> {
    match format {
        Format::Structured => Ok(json::decode(bytes)?),
        Format::Binary => Ok(binary::decode(bytes)?),
    }
}

/// Write `bytes` to `path` through a sibling temporary file. Either the whole
/// content lands or the previous file is left as it was.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SaveError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let fail = |source: std::io::Error| SaveError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(parent).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    Ok(())
}

fn with_extension_appended(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

impl Board {
    /// Save using the format named by the extension. A path with neither
    /// `.jpcb` nor `.pcb` is saved as a structured document with `.jpcb`
    /// appended. Returns the path actually written.
    pub fn save(&self, path: &Path) -> Result<PathBuf, SaveError> {
        let (path, format) = match Format::from_path(path) {
            Some(format) => (path.to_path_buf(), format),
            None => (
                with_extension_appended(path, Format::Structured.extension()),
                Format::Structured,
            ),
        };
        self.save_as(&path, format)?;
        Ok(path)
    }

    pub fn save_as(&self, path: &Path, format: Format) -> Result<(), SaveError> {
        let scene = self.snapshot()?;
        let bytes = encode(&scene, format)?;
        write_atomic(path, &bytes)?;
        log::info!("Saved {:?} board to {}", format, path.display());
        Ok(())
    }

    /// Replace the board's contents with the file at `path`. The format comes
    /// from the extension, or from the content when the extension is unknown.
    /// On failure the board is unchanged.
    pub fn load(&mut self, path: &Path) -> Result<(), LoadError> {
        log::debug!("Loading board from {}", path.display());
        let bytes = std::fs::read(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let format = Format::from_path(path).unwrap_or_else(|| Format::sniff(&bytes));
        let scene = decode(&bytes, format)?;
        self.load_scene(scene)
    }

    pub fn open(path: &Path) -> Result<Board, LoadError> {
        let mut board = Board::new();
        board.load(path)?;
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            Format::from_path(Path::new("a.jpcb")),
            Some(Format::Structured)
        );
        assert_eq!(
            Format::from_path(Path::new("dir/a.PCB")),
            Some(Format::Binary)
        );
        assert_eq!(Format::from_path(Path::new("a.json")), None);
        assert_eq!(Format::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(Format::sniff(b"{\"components\": []}"), Format::Structured);
        let stream = binary::encode(&Scene::default());
        assert_eq!(Format::sniff(&stream), Format::Binary);
    }

    #[test]
    fn test_save_appends_extension() {
        let dir = tempfile::tempdir().unwrap();
        let written = Board::new().save(&dir.path().join("board")).unwrap();
        assert_eq!(written, dir.path().join("board.jpcb"));
        assert!(written.exists());
    }

    #[test]
    fn test_write_atomic_failure_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing_dir = dir.path().join("nope").join("board.pcb");
        let err = write_atomic(&missing_dir, b"data").unwrap_err();
        assert!(matches!(err, SaveError::Write { .. }));

        let target = dir.path().join("board.pcb");
        std::fs::write(&target, b"old").unwrap();
        write_atomic(&target, b"new").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut board = Board::new();
        let err = board.load(&dir.path().join("missing.jpcb")).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
        assert!(err.to_string().starts_with("Failed to read"));
    }
}
