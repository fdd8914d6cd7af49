//! Persisted copies of the compiler inputs, for reproducible builds and verification

use crate::{
    error::{CompileError, Result},
    input::{identity_of, StandardCompilerInput},
    utils,
};
use std::path::{Path, PathBuf};

/// Represents a serialized [`StandardCompilerInput`] together with its identity
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawBuildInfo {
    /// The hash that identifies the build info
    pub id: String,
    /// canonical json of the input, this is exactly what is written to disk
    pub content: Vec<u8>,
}

// === impl RawBuildInfo ===

impl RawBuildInfo {
    /// Serializes the input once and derives its identity from those bytes
    pub fn new(input: &StandardCompilerInput) -> Result<Self> {
        let content = input.canonical_json()?;
        let id = identity_of(&content);
        Ok(RawBuildInfo { id, content })
    }

    /// The file name this build info is stored as, `<id>.json`
    pub fn file_name(&self) -> String {
        format!("{}.json", self.id)
    }

    /// Deserializes a persisted build info file
    pub fn read(path: impl AsRef<Path>) -> Result<StandardCompilerInput> {
        utils::read_json_file(path)
    }
}

/// Writes [`RawBuildInfo`]s into a directory
#[derive(Debug, Clone)]
pub struct BuildInfoWriter {
    dir: PathBuf,
}

impl BuildInfoWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory build infos are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path the build info with the given id is stored at
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Creates the directory if missing and replaces `<dir>/<id>.json`
    ///
    /// Writing the same build info twice is not an error, the file keeps identical content.
    #[tracing::instrument(skip_all, fields(id = %info.id))]
    pub async fn write(&self, info: &RawBuildInfo) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|err| CompileError::io(err, &self.dir))?;
        let file = self.dir.join(info.file_name());
        tracing::trace!("writing build info to \"{}\"", file.display());
        let content = info.content.clone();
        let target = file.clone();
        tokio::task::spawn_blocking(move || utils::write_atomic(target, &content)).await??;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Source, Sources, DEFAULT_OUTPUTS, SOLIDITY};
    use std::fs;

    fn input() -> StandardCompilerInput {
        StandardCompilerInput::with_sources(Sources::from([(
            "contracts/Greeter.sol".to_string(),
            Source::new("contract Greeter {}"),
        )]))
    }

    #[test]
    fn id_is_hash_of_content() {
        let info = RawBuildInfo::new(&input()).unwrap();
        assert_eq!(info.id, input().identity().unwrap());
        assert_eq!(info.content, input().canonical_json().unwrap());
        assert_eq!(info.file_name(), format!("{}.json", info.id));
    }

    #[tokio::test]
    async fn writes_into_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BuildInfoWriter::new(tmp.path().join("build-info"));
        let info = RawBuildInfo::new(&input()).unwrap();

        let file = writer.write(&info).await.unwrap();
        assert_eq!(file, writer.path_for(&info.id));

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&file).unwrap()).unwrap();
        assert_eq!(value["language"], SOLIDITY);
        let outputs = value["settings"]["outputSelection"]["*"]["*"].as_array().unwrap();
        assert!(DEFAULT_OUTPUTS.iter().all(|o| outputs.iter().any(|v| v == o)));

        assert_eq!(RawBuildInfo::read(&file).unwrap(), input());
    }

    #[tokio::test]
    async fn rewriting_same_input_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BuildInfoWriter::new(tmp.path());
        let info = RawBuildInfo::new(&input()).unwrap();

        let file = writer.write(&info).await.unwrap();
        let first = fs::read(&file).unwrap();
        writer.write(&RawBuildInfo::new(&input()).unwrap()).await.unwrap();
        assert_eq!(fs::read(&file).unwrap(), first);
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
