#![doc = include_str!("../README.md")]

#[doc(inline)]
pub use tronbox_compile as compile;

pub mod prelude {
    pub use tronbox_compile::{
        CompileError, CompileMode, CompileOptions, CompileOutput, CompileWorkflow,
        ProjectCompiler, ProjectConfig, Solc,
    };
}
