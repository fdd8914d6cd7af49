//! Selection of what a compilation run covers

use crate::{config::CompileConfig, utils};
use std::{fmt, path::PathBuf};

/// Determines which sources are handed to the compiler backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileMode {
    /// Compile exactly these sources and their imports, in this order
    Specific(Vec<PathBuf>),
    /// Compile every source of the project
    All,
    /// Compile only the sources that changed since the last build
    Necessary,
}

impl CompileMode {
    /// Selects the mode for the given config
    ///
    /// A non-empty target list always wins over the `all` flags, which in turn win over
    /// [`CompileMode::Necessary`].
    pub fn select(config: &CompileConfig) -> Self {
        if !config.compile_targets.is_empty() {
            return CompileMode::Specific(
                config
                    .compile_targets
                    .iter()
                    .map(|target| utils::resolve_against(&config.working_directory, target))
                    .collect(),
            )
        }
        if config.compile_everything() {
            return CompileMode::All
        }
        CompileMode::Necessary
    }
}

impl fmt::Display for CompileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileMode::Specific(targets) => write!(f, "specific ({} targets)", targets.len()),
            CompileMode::All => f.write_str("all"),
            CompileMode::Necessary => f.write_str("necessary"),
        }
    }
}
