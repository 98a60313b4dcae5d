//! ビルダー戦略
//!
//! プロジェクトの `builder` 定義から、`docker build` に渡す Dockerfile と
//! ビルドコンテキストを決定します。dotnet / nodejs は Dockerfile を一時ファイルに生成します。

pub mod dotnet;
pub mod manual;
pub mod node;
pub mod templates;

use crate::error::{BuildError, Result};
use monobuild_core::{
    BuildSettings, BuilderConfig, FileCache, ManualBuilder, OnMissing, ProjectWithPath, Variables,
    substitute,
};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempPath;
use tracing::debug;

/// `docker build` の引数
#[derive(Debug)]
pub struct BuildArguments {
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    /// 生成した Dockerfile（drop 時に削除される）
    generated: Option<TempPath>,
}

impl BuildArguments {
    /// 既存の Dockerfile を使う
    pub fn existing(dockerfile: PathBuf, context: PathBuf) -> Self {
        Self {
            dockerfile,
            context,
            generated: None,
        }
    }

    fn generated(dockerfile: TempPath, context: PathBuf) -> Self {
        Self {
            dockerfile: dockerfile.to_path_buf(),
            context,
            generated: Some(dockerfile),
        }
    }

    pub fn is_generated(&self) -> bool {
        self.generated.is_some()
    }
}

/// プロジェクトのビルド引数を取得
///
/// `builder` が省略されている場合は manual として扱う。
pub async fn build_arguments(
    project: &ProjectWithPath,
    settings: &BuildSettings,
    files: &FileCache,
) -> Result<BuildArguments> {
    let kind = project
        .config
        .builder
        .as_ref()
        .map(BuilderConfig::kind)
        .unwrap_or("manual");
    debug!(builder = kind, "Resolving build arguments");

    match &project.config.builder {
        None => Ok(manual::build_arguments(
            project,
            &ManualBuilder::default(),
            settings,
        )),
        Some(BuilderConfig::Manual(builder)) => {
            Ok(manual::build_arguments(project, builder, settings))
        }
        Some(BuilderConfig::Dotnet(builder)) => {
            dotnet::build_arguments(project, builder, settings, files).await
        }
        Some(BuilderConfig::Node(builder)) => node::build_arguments(project, builder).await,
        Some(BuilderConfig::Unsupported) => Err(BuildError::UnsupportedBuilder {
            service: project.service_name().to_string(),
        }),
    }
}

/// テンプレートに値を埋め込む（未定義のトークンはそのまま残す）
fn render(template: &str, values: &[(&str, String)]) -> Result<String> {
    let values: Variables = values
        .iter()
        .map(|(key, value)| (key.to_string(), serde_json::Value::String(value.clone())))
        .collect();
    Ok(substitute(
        template,
        &values,
        &HashMap::new(),
        OnMissing::Keep,
    )?)
}

/// 生成した Dockerfile を一意な一時ファイルに書き出す
fn write_dockerfile(content: &str, context: PathBuf) -> Result<BuildArguments> {
    let mut file = tempfile::Builder::new()
        .prefix("monobuild-")
        .suffix(".Dockerfile")
        .tempfile()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;

    let path = file.into_temp_path();
    debug!(dockerfile = %path.display(), "Generated Dockerfile");
    Ok(BuildArguments::generated(path, context))
}
