//! dotnet ビルダー
//!
//! プロジェクトディレクトリの .csproj から、`ProjectReference` を推移的に辿って
//! 依存プロジェクトを集め、restore をキャッシュできる Dockerfile を生成します。
//! ビルドコンテキストはソースツリーのルートです。

use super::{BuildArguments, render, templates, write_dockerfile};
use crate::error::{BuildError, Result};
use monobuild_core::paths;
use monobuild_core::{BuildSettings, DotnetBuilder, DotnetRuntime, FileCache, ProjectWithPath};
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static PROJECT_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"ProjectReference\s+Include="([^"]*)""#).expect("valid regex")
});

static PACKAGE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"PackageReference\s+Include="([^"]*)""#).expect("valid regex")
});

static WEB_SDK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Sdk="Microsoft\.NET\.Sdk\.Web""#).expect("valid regex"));

const PROJECT_EXTENSION: &str = "csproj";
const DOCKER_SRC: &str = "/src/";
pub const DEFAULT_DOTNET_VERSION: &str = "3.1";

pub const RUNTIME_IMAGE: &str = "mcr.microsoft.com/dotnet/core/runtime";
pub const ASPNET_IMAGE: &str = "mcr.microsoft.com/dotnet/core/aspnet";

/// これらを参照していれば ASP.NET ランタイムを使う
const ASPNET_PACKAGES: &[&str] = &["Microsoft.AspNetCore.App", "Microsoft.AspNetCore.All"];

pub async fn build_arguments(
    project: &ProjectWithPath,
    builder: &DotnetBuilder,
    settings: &BuildSettings,
    files: &FileCache,
) -> Result<BuildArguments> {
    let project_file = find_project_file(project.path()).await?;
    let project_files = resolve_project_references(&project_file, files).await?;
    let packages = find_package_references(&project_files, files).await?;
    let uses_web_sdk = WEB_SDK.is_match(&*files.read(&project_file).await?);

    debug!(
        project_file = %project_file.display(),
        references = project_files.len() - 1,
        packages = ?packages,
        "Resolved dotnet project"
    );

    let context = settings.sources_dir.clone();
    let relative = project_files
        .iter()
        .map(|path| relative_slash(path, &context))
        .collect::<Result<Vec<_>>>()?;
    let (own, dependencies) = relative
        .split_first()
        .ok_or_else(|| BuildError::ProjectFileNotFound(project_file.clone()))?;

    let project_name = project_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let project_dir = format!("{}{}", DOCKER_SRC, relative_slash(project.path(), &context)?);
    let dotnet_version = builder
        .dotnetversion
        .clone()
        .unwrap_or_else(|| DEFAULT_DOTNET_VERSION.to_string());
    let runtime_image = select_runtime_image(builder.dotnetruntime, &packages, uses_web_sdk);

    let content = render(
        templates::DOTNET_DOCKERFILE,
        &[
            (
                "COPY_PROJECT_DEPENDENCIES_PROJECTFILES",
                copy_commands(dependencies.iter().cloned()),
            ),
            (
                "COPY_PROJECT_DEPENDENCIES",
                copy_commands(dependencies.iter().map(|dep| parent_dir(dep))),
            ),
            ("COPY_PROJECTFILE", copy_command(own)),
            ("COPY_PROJECTDIR", copy_command(&parent_dir(own))),
            ("PROJECTDIR", project_dir),
            ("PROJECTNAME", project_name),
            ("DOCKER_RUNTIME_IMAGE", runtime_image.to_string()),
            ("DOTNET_VERSION", dotnet_version),
        ],
    )?;

    write_dockerfile(&content, context)
}

/// プロジェクトディレクトリ直下の .csproj（複数ある場合は名前順で最初）
pub async fn find_project_file(project_dir: &Path) -> Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(project_dir)
        .await
        .map_err(|_| BuildError::ProjectFileNotFound(project_dir.to_path_buf()))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_project = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(PROJECT_EXTENSION));
        if is_project && entry.file_type().await?.is_file() {
            candidates.push(path);
        }
    }

    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| BuildError::ProjectFileNotFound(project_dir.to_path_buf()))
}

/// `ProjectReference` を推移的に解決する
///
/// 先頭は起点のプロジェクトファイル。訪問済みの絶対パスは再訪しないため循環参照でも停止する。
pub async fn resolve_project_references(
    project_file: &Path,
    files: &FileCache,
) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::new();
    let mut visited = HashSet::new();
    let mut pending = VecDeque::from([paths::normalize(project_file)]);

    while let Some(path) = pending.pop_front() {
        if !visited.insert(path.clone()) {
            continue;
        }

        let content = files.read(&path).await?;
        let dir = path.parent().unwrap_or_else(|| Path::new("/"));
        for caps in PROJECT_REFERENCE.captures_iter(&content) {
            let reference = caps[1].replace('\\', "/");
            let dependency = paths::normalize(&dir.join(reference));
            if !visited.contains(&dependency) {
                pending.push_back(dependency);
            }
        }

        resolved.push(path);
    }

    Ok(resolved)
}

/// 全プロジェクトファイルの `PackageReference` 名（重複なし、出現順）
pub async fn find_package_references(
    project_files: &[PathBuf],
    files: &FileCache,
) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut packages = Vec::new();

    for path in project_files {
        let content = files.read(path).await?;
        for caps in PACKAGE_REFERENCE.captures_iter(&content) {
            let Some(name) = caps[1].split_whitespace().next() else {
                continue;
            };
            if seen.insert(name.to_string()) {
                packages.push(name.to_string());
            }
        }
    }

    Ok(packages)
}

/// ランタイムイメージの選択
///
/// 明示指定 > ASP.NET パッケージ参照 / Web SDK > 通常ランタイム
pub fn select_runtime_image(
    explicit: Option<DotnetRuntime>,
    packages: &[String],
    uses_web_sdk: bool,
) -> &'static str {
    match explicit {
        Some(DotnetRuntime::Aspnet) => ASPNET_IMAGE,
        Some(DotnetRuntime::Runtime) => RUNTIME_IMAGE,
        None => {
            let references_aspnet = packages
                .iter()
                .any(|package| ASPNET_PACKAGES.contains(&package.as_str()));
            if references_aspnet || uses_web_sdk {
                ASPNET_IMAGE
            } else {
                RUNTIME_IMAGE
            }
        }
    }
}

fn copy_command(path: &str) -> String {
    format!("COPY {} {}{}", path, DOCKER_SRC, path)
}

fn copy_commands(paths: impl Iterator<Item = String>) -> String {
    paths
        .map(|path| copy_command(&path))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parent_dir(relative: &str) -> String {
    match Path::new(relative).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => paths::to_slash(parent),
        _ => ".".to_string(),
    }
}

/// ビルドコンテキストからの相対パス（`/` 区切り）
fn relative_slash(path: &Path, context: &Path) -> Result<String> {
    paths::relative_to(path, context)
        .map(|relative| paths::to_slash(&relative))
        .ok_or_else(|| {
            BuildError::InvalidConfig(format!(
                "{} はビルドコンテキスト {} の外にあります",
                path.display(),
                context.display()
            ))
        })
}
