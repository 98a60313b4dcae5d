//! docker CLI ラッパー
//!
//! `docker build` / `docker push` / `docker login` を実行し、テキスト出力から
//! ビルドキャッシュIDとダイジェストを取り出します。
//! 出力の解析は `parse_build_output` / `parse_push_output` に閉じ込めてあります。

use crate::error::{BuildError, Result};
use crate::runner::{CommandRunner, CommandSpec};
use monobuild_core::RegistryCredentials;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// `docker build` 成功時に出力されるマーカー
pub const BUILD_SUCCESS_MARKER: &str = "Successfully built ";

/// マーカー直後のビルドキャッシュIDの長さ
pub const BUILD_CACHE_ID_LEN: usize = 12;

/// `docker push` 出力中のダイジェスト開始マーカー
pub const DIGEST_MARKER: &str = "digest:";

/// `docker push` 出力中のダイジェスト終了マーカー
pub const SIZE_MARKER: &str = "size:";

const DOCKER: &str = "docker";

pub struct DockerCli {
    runner: Arc<dyn CommandRunner>,
}

impl DockerCli {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// イメージをビルドしてビルドキャッシュIDを返す
    ///
    /// BuildKit は `Successfully built` を出力しないため、従来のビルダーを強制する。
    pub async fn build(
        &self,
        service: &str,
        dockerfile: &Path,
        image_tag: &str,
        context: &Path,
        cwd: &Path,
    ) -> Result<String> {
        let spec = CommandSpec::new(DOCKER)
            .arg("build")
            .arg("-f")
            .path_arg(dockerfile)
            .arg("-t")
            .arg(image_tag)
            .path_arg(context)
            .current_dir(cwd)
            .env("DOCKER_BUILDKIT", "0");

        let output = self.runner.run(&spec).await?;
        let cache_id = parse_build_output(service, &output.stdout)?;
        debug!(cache_id = %cache_id, "Parsed build cache id");
        Ok(cache_id)
    }

    /// イメージをプッシュしてレジストリのダイジェストを返す
    pub async fn push(&self, service: &str, image_tag: &str) -> Result<String> {
        let spec = CommandSpec::new(DOCKER).arg("push").arg(image_tag);
        let output = self.runner.run(&spec).await?;
        parse_push_output(service, &output.stdout)
    }

    /// レジストリにログイン（パスワードは標準入力で渡す）
    pub async fn login(&self, registry: &str, credentials: &RegistryCredentials) -> Result<()> {
        info!(registry = %registry, user = %credentials.username, "Logging in to registry");
        let spec = CommandSpec::new(DOCKER)
            .arg("login")
            .arg("-u")
            .arg(&credentials.username)
            .arg("--password-stdin")
            .arg(registry)
            .stdin(credentials.password.clone());
        self.runner.run(&spec).await?;
        Ok(())
    }
}

/// `docker build` の出力からビルドキャッシュIDを取り出す
///
/// 最後に現れた `Successfully built ` の直後 12 文字。
pub fn parse_build_output(service: &str, output: &str) -> Result<String> {
    let start = output
        .rfind(BUILD_SUCCESS_MARKER)
        .ok_or_else(|| BuildError::OutputParse {
            service: service.to_string(),
            message: format!("'{}' が出力に含まれていません", BUILD_SUCCESS_MARKER.trim()),
        })?
        + BUILD_SUCCESS_MARKER.len();

    let cache_id: String = output[start..].chars().take(BUILD_CACHE_ID_LEN).collect();
    if cache_id.chars().count() < BUILD_CACHE_ID_LEN || cache_id.contains(char::is_whitespace) {
        return Err(BuildError::OutputParse {
            service: service.to_string(),
            message: format!("ビルドキャッシュIDが不正です: '{}'", cache_id),
        });
    }

    Ok(cache_id)
}

/// `docker push` の出力からダイジェストを取り出す
///
/// 最後の `digest:` と最後の `size:` の間をトリムしたもの。
pub fn parse_push_output(service: &str, output: &str) -> Result<String> {
    let parse_error = |message: &str| BuildError::OutputParse {
        service: service.to_string(),
        message: message.to_string(),
    };

    let start = output
        .rfind(DIGEST_MARKER)
        .ok_or_else(|| parse_error("'digest:' が出力に含まれていません"))?
        + DIGEST_MARKER.len();
    let end = output
        .rfind(SIZE_MARKER)
        .ok_or_else(|| parse_error("'size:' が出力に含まれていません"))?;

    if end < start {
        return Err(parse_error("'size:' が 'digest:' より前にあります"));
    }

    let digest = output[start..end].trim();
    if digest.is_empty() {
        return Err(parse_error("ダイジェストが空です"));
    }

    Ok(digest.to_string())
}
