//! monobuild core
//!
//! モノレポ内のプロジェクト設定の発見、データモデル、トークン置換エンジンを提供します。

pub mod discovery;
pub mod error;
pub mod file_cache;
pub mod model;
pub mod paths;
pub mod settings;
pub mod token;

pub use discovery::{Selection, discover, read_project_config};
pub use error::{CoreError, Result};
pub use file_cache::FileCache;
pub use model::*;
pub use settings::{BuildSettings, RegistryCredentials, ReleaseSettings};
pub use token::{OnMissing, Variables, contains_tokens, substitute};
