use std::{fmt, path::PathBuf};

use thiserror::Error;

/// A location in a scene description file, carried through to
/// construction-time diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLoc {
    pub filename: String,
    pub line: u32,
}

impl FileLoc {
    pub fn new(filename: impl Into<String>, line: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
        }
    }
}

impl fmt::Display for FileLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.line)
    }
}

fn fmt_loc(loc: &Option<FileLoc>) -> String {
    match loc {
        Some(loc) => format!("{loc}: "),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or contradictory construction parameters.
    #[error("{}parameter \"{param}\": {reason}", fmt_loc(.loc))]
    Config {
        loc: Option<FileLoc>,
        param: String,
        reason: String,
    },

    #[error("{}unrecognized medium kind \"{kind}\"", fmt_loc(.loc))]
    UnknownMediumKind {
        loc: Option<FileLoc>,
        kind: String,
    },

    #[error("failed to read grid file \"{}\": {source}", .path.display())]
    GridIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed grid file \"{}\": {reason}", .path.display())]
    GridFormat { path: PathBuf, reason: String },
}
