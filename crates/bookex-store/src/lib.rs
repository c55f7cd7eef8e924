#![allow(async_fn_in_trait)]
use std::str::FromStr;

use error::{StoreError, StoreResult};

pub mod error;
pub mod file_store;
pub use file_store::FileStore;
use tracing::debug;

const BOOKS_PATH_PREFIX: &str = "books";

const MAX_PATH_LEN: usize = 4095;
const MAX_SEGMENT_LEN: usize = 255;
const MAX_PATH_DEPTH: usize = 10;
const PATH_INVALID_CHARS: &str = r#"/\:"#;

pub enum StorePrefix {
    Books,
}

impl StorePrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorePrefix::Books => BOOKS_PATH_PREFIX,
        }
    }
}

fn is_segment_invalid(s: &str) -> bool {
    s.is_empty()
        || s.starts_with(".")
        || s.len() > MAX_SEGMENT_LEN
        || s.chars()
            .any(|c| PATH_INVALID_CHARS.contains(c) || c.is_ascii_control())
}

fn validate_path(path: &str) -> StoreResult<()> {
    if path.is_empty() {
        return Err(StoreError::InvalidPath);
    }
    if path.starts_with("/") || path.ends_with("/") {
        return Err(StoreError::InvalidPath);
    }
    if path.len() > MAX_PATH_LEN {
        return Err(StoreError::InvalidPath);
    }
    let segments = path.split('/').collect::<Vec<_>>();
    if segments.len() > MAX_PATH_DEPTH {
        return Err(StoreError::InvalidPath);
    }
    let invalid_path = segments.into_iter().any(is_segment_invalid);
    if invalid_path {
        Err(StoreError::InvalidPath)
    } else {
        Ok(())
    }
}

/// Keeps only word characters, dashes and dots of uploaded file name, spaces become underscores
pub fn clean_file_name(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or_default();
    name.trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' => Some(c),
            _ => None,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// Destination of uploaded book picture, `books/<cleaned file name>`
pub fn picture_path(file_name: &str) -> StoreResult<ValidPath> {
    let mut name = clean_file_name(file_name);
    if name.is_empty() {
        name = uuid::Uuid::new_v4().to_string();
    }
    let dest_path = ValidPath::new(name)?.with_prefix(StorePrefix::Books);
    Ok(dest_path)
}

/// relative path, utf8, validated not to escape root and use . segments and some special chars
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPath(String);

impl ValidPath {
    pub fn new(path: impl Into<String>) -> StoreResult<Self> {
        let path = path.into();
        validate_path(path.as_str()).inspect_err(|_| debug!("Invalid path: {path}"))?;
        Ok(ValidPath(path))
    }
    pub fn with_prefix(self, prefix: StorePrefix) -> Self {
        ValidPath(format!("{}/{}", prefix.as_str(), self.0))
    }
}

impl FromStr for ValidPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValidPath::new(s)
    }
}

impl AsRef<str> for ValidPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ValidPath> for String {
    fn from(value: ValidPath) -> Self {
        value.0
    }
}

#[derive(Debug)]
pub struct StoreInfo {
    /// final path were the file is stored, can be different from the requested path
    pub final_path: ValidPath,
    pub size: u64,
}

pub trait Store {
    async fn store_data(&self, path: &ValidPath, data: &[u8]) -> StoreResult<StoreInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_path() {
        assert!(ValidPath::new("a/b/c").is_ok());
        assert!(ValidPath::new("a/b/c/").is_err());
        assert!(ValidPath::new("a/b/c/..").is_err());
    }

    #[test]
    fn test_clean_file_name() {
        assert_eq!(clean_file_name("my cover.jpg"), "my_cover.jpg");
        assert_eq!(clean_file_name("../../etc/passwd"), "passwd");
        assert_eq!(clean_file_name("C:\\pics\\hobbit(1).png"), "hobbit1.png");
        assert_eq!(clean_file_name(".hidden"), "hidden");
        assert_eq!(clean_file_name("Příliš žluťoučký.gif"), "Příliš_žluťoučký.gif");
    }

    #[test]
    fn test_picture_path() {
        let path = picture_path("hobbit cover.jpg").unwrap();
        assert_eq!(path.as_ref(), "books/hobbit_cover.jpg");
        let path = picture_path("???").unwrap();
        assert!(path.as_ref().starts_with("books/"));
        assert!(path.as_ref().len() > "books/".len());
    }
}
