//! データモデル

pub mod builder;
pub mod project;

pub use builder::*;
pub use project::*;
