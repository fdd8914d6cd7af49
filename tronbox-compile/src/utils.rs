//! Utility functions

use crate::error::{CompileError, Result};
use once_cell::sync::Lazy;
use path_slash::PathExt;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::{
    fs,
    io::Write,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

/// A regex that matches the import path and identifier of a solidity import
/// statement with the named groups "path", "id".
// Adapted from https://github.com/nomiclabs/hardhat/blob/cced766c65b25d3d0beb39ef847246ac9618bdd9/packages/hardhat-core/src/internal/solidity/parse.ts#L100
pub static RE_SOL_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+(?:(?:"(?P<p1>[^;]*)"|'(?P<p2>[^;]*)')(?:;|\s+as\s+(?P<id>[^;]*);)|.+from\s+(?:"(?P<p3>.*)"|'(?P<p4>.*)');)"#)
        .expect("valid import regex")
});

/// A regex that matches a contract, library or interface declaration with the named group "name"
pub static RE_SOL_CONTRACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:abstract\s+)?(?:contract|library|interface)\s+(?P<name>[A-Za-z_$][A-Za-z0-9_$]*)")
        .expect("valid contract regex")
});

/// Returns all path parts from any solidity import statement in a string,
/// `import "./contracts/Contract.sol";` -> `"./contracts/Contract.sol"`.
///
/// See also https://docs.soliditylang.org/en/v0.8.9/grammar.html
pub fn find_import_paths(contract: &str) -> Vec<&str> {
    RE_SOL_IMPORT
        .captures_iter(contract)
        .filter_map(|cap| {
            cap.name("p1").or_else(|| cap.name("p2")).or_else(|| cap.name("p3")).or_else(|| cap.name("p4"))
        })
        .map(|m| m.as_str())
        .collect()
}

/// Returns the names of all contracts, libraries and interfaces declared in the source
pub fn find_contract_names(contract: &str) -> Vec<&str> {
    RE_SOL_CONTRACT
        .captures_iter(contract)
        .filter_map(|cap| cap.name("name"))
        .map(|m| m.as_str())
        .collect()
}

/// Returns a sorted list of absolute paths to all the solidity files under the root
///
/// NOTE: this does not resolve imports from other locations
///
/// # Example
///
/// ```no_run
/// use tronbox_compile::utils;
/// let sources = utils::source_files("./contracts");
/// ```
pub fn source_files(root: impl AsRef<Path>) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|ext| ext == "sol").unwrap_or_default())
        .map(|e| e.path().into())
        .collect();
    files.sort();
    files
}

/// Resolves `path` against `base` if it is relative and removes `.` and `..` components
///
/// This is purely lexical, the path does not need to exist.
pub fn resolve_against(base: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let joined = if path.is_absolute() { path.to_path_buf() } else { base.as_ref().join(path) };
    normalize_path(&joined)
}

/// Lexically normalizes a path
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            c => out.push(c.as_os_str()),
        }
    }
    out
}

/// Canonicalize the path if it exists, otherwise it's returned normalized
pub fn canonicalized(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    dunce::canonicalize(&path).unwrap_or_else(|_| normalize_path(&path))
}

/// Returns the source unit name of the `source` relative to `root`, always with `/` separators
///
/// Sources outside of `root` keep their absolute path.
pub fn source_name(source: &Path, root: &Path) -> String {
    let relative = source.strip_prefix(root).unwrap_or(source);
    relative.to_slash_lossy().into_owned()
}

/// Returns the path of `path` relative to `base` for display purposes, `./build/contracts`
pub fn display_relative(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    format!(".{}{}", std::path::MAIN_SEPARATOR, relative.display())
}

/// Reads the json file and deserialize it into the provided type
pub fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|err| CompileError::io(err, path))?;
    Ok(serde_json::from_str(&content)?)
}

/// Creates the directory and all of its parents, an existing directory is not an error
pub fn create_dir_all(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).map_err(|err| CompileError::io(err, path))
}

/// Replaces the file at `path` with `content`
///
/// The content is written to a temporary file next to the target which is then renamed, so readers
/// never observe a truncated file.
pub fn write_atomic(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|err| CompileError::io(err, dir))?;
    tmp.write_all(content).map_err(|err| CompileError::io(err, tmp.path()))?;
    tmp.as_file().sync_all().map_err(|err| CompileError::io(err, tmp.path()))?;
    tmp.persist(path).map_err(|err| CompileError::io(err.error, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashSet,
        fs::{create_dir_all, File},
    };

    #[test]
    fn can_find_solidity_sources() {
        let tmp_dir = tempfile::tempdir().unwrap();

        let file_a = tmp_dir.path().join("a.sol");
        let file_b = tmp_dir.path().join("b.sol");
        let nested = tmp_dir.path().join("nested");
        let file_c = nested.join("c.sol");
        let nested_deep = nested.join("deep");
        let file_d = nested_deep.join("d.sol");
        let ignored = tmp_dir.path().join("README.md");
        File::create(&file_a).unwrap();
        File::create(&file_b).unwrap();
        create_dir_all(nested_deep).unwrap();
        File::create(&file_c).unwrap();
        File::create(&file_d).unwrap();
        File::create(ignored).unwrap();

        let files: HashSet<_> = source_files(tmp_dir.path()).into_iter().collect();
        let expected: HashSet<_> = [file_a, file_b, file_c, file_d].into();
        assert_eq!(files, expected);
    }

    #[test]
    fn can_find_import_paths() {
        let s = r##"//SPDX-License-Identifier: Unlicense
pragma solidity ^0.8.0;
import "hardhat/console.sol";
import '../contract/Contract.sol';
import {Ownable} from "./access/Ownable.sol";
"##;
        assert_eq!(
            vec!["hardhat/console.sol", "../contract/Contract.sol", "./access/Ownable.sol"],
            find_import_paths(s)
        );
    }

    #[test]
    fn can_find_contract_names() {
        let s = r##"pragma solidity ^0.8.0;
library Math {}
interface IToken {}
abstract contract Base {}
contract Token is Base, IToken {}
"##;
        assert_eq!(vec!["Math", "IToken", "Base", "Token"], find_contract_names(s));
    }

    #[test]
    fn resolves_relative_paths() {
        assert_eq!(
            resolve_against("/project", "contracts/../contracts/./A.sol"),
            PathBuf::from("/project/contracts/A.sol")
        );
        assert_eq!(resolve_against("/project", "/abs/B.sol"), PathBuf::from("/abs/B.sol"));
    }

    #[test]
    fn source_names_use_forward_slashes() {
        let root = Path::new("/project");
        assert_eq!(source_name(&root.join("contracts").join("A.sol"), root), "contracts/A.sol");
    }

    #[test]
    fn atomic_write_replaces_content() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let file = tmp_dir.path().join("out.json");
        write_atomic(&file, b"first").unwrap();
        write_atomic(&file, b"second").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "second");
        assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 1);
    }
}
