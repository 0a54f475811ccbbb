use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Tokenize errors
    #[error("Malformed quoting: {quotes} quote characters in `{piece}`")]
    Tokenize { piece: String, quotes: usize },

    #[error("Unterminated quoted field starting at `{0}`")]
    UnterminatedQuote(String),

    // Row errors
    #[error("Wrong column count: expected {expected}, found {found}")]
    ColumnCount { expected: String, found: usize },

    #[error("Cannot parse `{text}` as integer in column {column}")]
    InvalidNumber { column: &'static str, text: String },

    #[error("Invalid source line number: {0}")]
    InvalidSourceLine(i64),

    #[error("Label row without a name")]
    EmptyLabel,

    #[error("{}:{line}: {source}", path.display())]
    AtLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: Box<Error>,
    },

    // File errors
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to read file: {}", .0.display())]
    FileRead(PathBuf, #[source] std::io::Error),

    // Session metadata errors
    #[error("Malformed session metadata: {}", .0.display())]
    Xml(PathBuf, #[source] roxmltree::Error),

    #[error("Missing <{node}> under <{parent}>")]
    MissingNode { parent: String, node: &'static str },

    #[error("Unknown session metadata root: <{0}>")]
    UnknownRoot(String),

    #[error("Unknown output tag: <{0}>")]
    UnknownOutputTag(String),

    // Configuration errors
    #[error("Invalid configuration: {}", .0.display())]
    Config(PathBuf, #[source] serde_yaml::Error),
}

impl Error {
    /// 1-based line number of the failing row, if the error came from a file row.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::AtLine { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// The row-level cause, with any line wrapper removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::AtLine { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn at_line(self, path: impl Into<PathBuf>, line: usize) -> Self {
        Error::AtLine {
            path: path.into(),
            line,
            source: Box::new(self),
        }
    }
}

/// Read a whole file, mapping a missing file to `FileNotFound`.
pub(crate) fn read_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::FileRead(path.to_path_buf(), e),
    })
}
