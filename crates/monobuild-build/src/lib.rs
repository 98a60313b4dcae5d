//! monobuild build
//!
//! 発見したプロジェクトを docker でビルド・プッシュし、デプロイ成果物を出力します。
//!
//! ## 主な機能
//!
//! - **ビルダー**: manual / dotnet / nodejs の各方式で Dockerfile とコンテキストを決定
//! - **並列実行**: 同時ビルド数を制限したビルド → プッシュ
//! - **ダイジェストキャッシュ**: 同じ内容のイメージは再プッシュしない
//! - **成果物出力**: ダイジェスト固定のイメージ参照をマニフェストに埋め込む

pub mod artifacts;
pub mod builders;
pub mod cache;
pub mod docker;
pub mod error;
pub mod pipeline;
pub mod runner;

pub use builders::{BuildArguments, build_arguments};
pub use cache::{CacheOutcome, DigestCache};
pub use docker::{DockerCli, parse_build_output, parse_push_output};
pub use error::{BuildError, Result};
pub use pipeline::{BuildResult, Pipeline, PushResult};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
