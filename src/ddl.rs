use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Schema definitions handed to the model as prompt context.
///
/// The file is read verbatim; nothing is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlDocument {
    source: Option<PathBuf>,
    statements: String,
}

impl DdlDocument {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let statements = std::fs::read_to_string(path)?;
        info!("Loaded DDL from {:?} ({} bytes)", path, statements.len());
        Ok(Self {
            source: Some(path.to_path_buf()),
            statements,
        })
    }

    pub fn from_text(statements: impl Into<String>) -> Self {
        Self {
            source: None,
            statements: statements.into(),
        }
    }

    pub fn statements(&self) -> &str {
        &self.statements
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_load_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.sql");
        let ddl = "CREATE TABLE employees (\n  id INT,\n  hire_date DATE\n);\n\n";
        std::fs::write(&path, ddl).unwrap();

        let doc = DdlDocument::load(&path).unwrap();
        assert_eq!(doc.statements(), ddl);
        assert_eq!(doc.source(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DdlDocument::load(dir.path().join("missing.sql"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
