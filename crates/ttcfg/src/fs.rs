//! file access used by the resolver
//!
//! Everything that touches files goes through [FileSystem]. [StdFileSystem] reads from disk, [MemoryFileSystem]
//! serves unsaved editor buffers (and tests).
use indexmap::IndexMap;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error")]
    Io(#[from] io::Error),
    #[error("cannot resolve {}", .0.display())]
    Unresolvable(PathBuf),
}

pub trait FileSystem {
    /// Canonical, absolute form of an existing file's path
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, LoadError>;

    fn read_utf8(&self, path: &Path) -> Result<String, LoadError>;

    /// Resolve an include string relative to the directory of the including file
    ///
    /// `None` when the result does not name an existing file.
    fn resolve(&self, base: &Path, raw: &str) -> Option<PathBuf> {
        let raw = Path::new(raw);
        let candidate = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            base.parent().unwrap_or_else(|| Path::new("")).join(raw)
        };

        self.canonicalize(&candidate).ok()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, LoadError> {
        path.canonicalize()
            .map_err(|_| LoadError::Unresolvable(path.to_path_buf()))
    }

    fn read_utf8(&self, path: &Path) -> Result<String, LoadError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// In-memory files keyed by absolute, lexically normalized path
///
/// Relative paths are taken relative to `/`.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    files: IndexMap<PathBuf, String>,
}

impl MemoryFileSystem {
    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), text.into());
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn remove(&mut self, path: impl AsRef<Path>) -> Option<String> {
        self.files.shift_remove(&normalize(path.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileSystem for MemoryFileSystem {
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, LoadError> {
        let normalized = normalize(path);
        if self.files.contains_key(&normalized) {
            Ok(normalized)
        } else {
            Err(LoadError::Unresolvable(path.to_path_buf()))
        }
    }

    fn read_utf8(&self, path: &Path) -> Result<String, LoadError> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| {
            LoadError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            ))
        })
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Utility macro to create a [MemoryFileSystem]
///
/// ```
/// # use ttcfg::memory_fs;
/// let fs = memory_fs! {
///   "/cfg/main.cfg" => "[INCLUDE]\n\"common.cfg\"\n",
///   "/cfg/common.cfg" => "[DEFINE]\nA := 1\n"
/// };
/// assert_eq!(fs.len(), 2);
/// ```
#[macro_export]
macro_rules! memory_fs {
    { $($path:expr => $text:expr),+ $(,)? } => {{
        let mut fs = $crate::fs::MemoryFileSystem::default();
        $(
            fs.insert($path, $text);
        )+
        fs
    }};
}
