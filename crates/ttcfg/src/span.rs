//! source locations attached to diagnostics and macro definitions
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// An immutable `(file, line, start, end)` location
///
/// Offsets are byte offsets into the file, `end` exclusive. Synthesized text (for example a macro value coming
/// from an environment variable) has no location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceSpan {
    file: Option<PathBuf>,
    location: Option<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(file: Option<PathBuf>, line: usize, start: usize, end: usize) -> Self {
        Self {
            file,
            location: Some(Location { line, start, end }),
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: None,
            location: None,
        }
    }

    /// Same location, attributed to `file`
    pub fn in_file(&self, file: Option<&Path>) -> Self {
        Self {
            file: file.map(Path::to_path_buf),
            location: self.location,
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

impl Display for SourceSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.file, &self.location) {
            (Some(file), Some(location)) => write!(f, "{}:{}", file.display(), location.line),
            (Some(file), None) => write!(f, "{}", file.display()),
            (None, Some(location)) => write!(f, "line {}", location.line),
            (None, None) => f.write_str("<unknown>"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display() {
        let span = SourceSpan::new(Some("a.cfg".into()), 3, 10, 14);
        assert_eq!(span.to_string(), "a.cfg:3");
        assert_eq!(SourceSpan::unknown().to_string(), "<unknown>");
        assert_eq!(
            SourceSpan::new(None, 7, 0, 1).in_file(Some(Path::new("b.cfg"))),
            SourceSpan::new(Some("b.cfg".into()), 7, 0, 1)
        );
    }
}
