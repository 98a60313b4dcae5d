//! ビルド & プッシュパイプライン
//!
//! 発見 → 並列（ビルド → プッシュ）→ 成果物出力 → ダイジェストキャッシュ保存
//!
//! いずれかのプロジェクトが失敗した時点で実行全体が失敗します。
//! ダイジェストキャッシュは失敗時も保存されます。

use crate::artifacts;
use crate::builders;
use crate::cache::{CacheOutcome, DigestCache};
use crate::docker::DockerCli;
use crate::error::{BuildError, Result};
use crate::runner::CommandRunner;
use monobuild_core::{BuildSettings, FileCache, ProjectWithPath, discover};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// ビルド済みプロジェクト
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub project: ProjectWithPath,
    /// `docker build` が出力したビルドキャッシュID
    pub cache_id: String,
}

/// プッシュ済み（またはキャッシュヒットした）プロジェクト
#[derive(Debug, Clone)]
pub struct PushResult {
    pub build: BuildResult,
    pub digest: String,
    pub outcome: CacheOutcome,
}

impl PushResult {
    pub fn service_name(&self) -> &str {
        self.build.project.service_name()
    }

    pub fn project(&self) -> &ProjectWithPath {
        &self.build.project
    }

    pub fn is_cached(&self) -> bool {
        self.outcome == CacheOutcome::Hit
    }
}

#[derive(Clone)]
pub struct Pipeline {
    settings: Arc<BuildSettings>,
    docker: Arc<DockerCli>,
    files: Arc<FileCache>,
    env: Arc<HashMap<String, String>>,
}

impl Pipeline {
    /// `env` はトークン置換のフォールバックに使うプロセス環境変数
    pub fn new(
        settings: BuildSettings,
        runner: Arc<dyn CommandRunner>,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            docker: Arc::new(DockerCli::new(runner)),
            files: Arc::new(FileCache::new()),
            env: Arc::new(env),
        }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// パイプライン全体を実行
    ///
    /// 結果はサービス名順。
    #[tracing::instrument(skip(self), fields(registry = %self.settings.registry, build_id = %self.settings.build_id))]
    pub async fn run(&self) -> Result<Vec<PushResult>> {
        clear_artifact_dir(&self.settings.artifact_dir).await?;

        let cache = Arc::new(DigestCache::load(&self.settings.digest_cache_path).await);
        let outcome = self.execute(cache.clone()).await;
        let persisted = cache.persist().await;

        match (outcome, persisted) {
            (Ok(results), Ok(())) => Ok(results),
            (Ok(_), Err(persist_error)) => Err(persist_error),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(persist_error)) => {
                error!(error = %persist_error, "Failed to persist digest cache");
                Err(e)
            }
        }
    }

    async fn execute(&self, cache: Arc<DigestCache>) -> Result<Vec<PushResult>> {
        self.login().await?;

        let projects = discover(&self.settings.sources_dir, &self.settings.selection)?;
        if projects.is_empty() {
            warn!(
                sources_dir = %self.settings.sources_dir.display(),
                "No projects found"
            );
        }

        let mut results = self.build_and_push_all(projects, cache).await?;
        results.sort_by(|a, b| a.service_name().cmp(b.service_name()));

        artifacts::emit_artifacts(&results, &self.settings, &self.env, &self.files).await?;
        Ok(results)
    }

    async fn login(&self) -> Result<()> {
        match &self.settings.credentials {
            Some(credentials) if !self.settings.registry.is_empty() => {
                self.docker
                    .login(&self.settings.registry, credentials)
                    .await
            }
            _ => {
                debug!("No registry credentials configured, skipping login");
                Ok(())
            }
        }
    }

    /// 同時実行数を制限してビルド → プッシュを実行
    ///
    /// 最初のエラーで残りのタスクを中断して返す。
    async fn build_and_push_all(
        &self,
        projects: Vec<ProjectWithPath>,
        cache: Arc<DigestCache>,
    ) -> Result<Vec<PushResult>> {
        let limit = self.settings.concurrency();
        info!(projects = projects.len(), concurrency = limit, "Building projects");

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut join_set = JoinSet::new();

        for project in projects {
            let pipeline = self.clone();
            let semaphore = semaphore.clone();
            let cache = cache.clone();

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| BuildError::TaskFailed(e.to_string()))?;
                let build = pipeline.build(project).await?;
                pipeline.push(build, &cache).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => {
                    error!(error = %e, "Build failed, aborting remaining projects");
                    return Err(e);
                }
                Err(join_error) => return Err(BuildError::TaskFailed(join_error.to_string())),
            }
        }

        Ok(results)
    }

    /// 1プロジェクトをビルドしてビルドキャッシュIDを得る
    #[tracing::instrument(skip_all, fields(service = %project.service_name()))]
    pub async fn build(&self, project: ProjectWithPath) -> Result<BuildResult> {
        debug!(config = ?project.config, path = %project.path().display(), "Running build");
        let started = Instant::now();

        let arguments = builders::build_arguments(&project, &self.settings, &self.files).await?;
        let image_tag = self.settings.image_tag(project.service_name());
        debug!(
            dockerfile = %arguments.dockerfile.display(),
            image = %image_tag,
            context = %arguments.context.display(),
            cwd = %self.settings.sources_dir.display(),
            "Invoking docker build"
        );

        let cache_id = self
            .docker
            .build(
                project.service_name(),
                &arguments.dockerfile,
                &image_tag,
                &arguments.context,
                &self.settings.sources_dir,
            )
            .await?;
        drop(arguments);

        info!(
            cache_id = %cache_id,
            "Building project done. Took {} seconds",
            started.elapsed().as_secs()
        );
        Ok(BuildResult { project, cache_id })
    }

    /// ビルド済みイメージをプッシュしてダイジェストを得る
    ///
    /// ビルドキャッシュIDがダイジェストキャッシュにあればプッシュしない。
    #[tracing::instrument(skip_all, fields(service = %build.project.service_name(), cache_id = %build.cache_id))]
    pub async fn push(&self, build: BuildResult, cache: &DigestCache) -> Result<PushResult> {
        let service = build.project.service_name().to_string();
        let image_tag = self.settings.image_tag(&service);
        let docker = self.docker.clone();

        let (digest, outcome) = cache
            .resolve(&build.cache_id, move || async move {
                info!(image = %image_tag, "Pushing image");
                let started = Instant::now();
                let digest = docker.push(&service, &image_tag).await?;
                info!(
                    "Pushed image. Took {} seconds",
                    started.elapsed().as_secs()
                );
                Ok(digest)
            })
            .await?;

        if outcome == CacheOutcome::Hit {
            info!("Build cache id found in digest cache, skipping push");
        }
        info!(digest = %digest, "Image digest resolved");

        Ok(PushResult {
            build,
            digest,
            outcome,
        })
    }
}

/// 成果物ディレクトリを削除（存在しなければ何もしない）
async fn clear_artifact_dir(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Cleared artifact directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BuildError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        }),
    }
}
