//! デプロイ成果物の出力
//!
//! プッシュ済みの各サービスについて、デプロイメントテンプレートに
//! `servicename` と `image`（ダイジェスト固定）を埋め込み、
//! `{artifact_dir}/{service}/` に設定ファイルのコピーと一緒に書き出します。

use crate::error::{BuildError, Result};
use crate::pipeline::PushResult;
use monobuild_core::settings::{ARTIFACT_FILE, CONFIGURATION_FILE};
use monobuild_core::{BuildSettings, FileCache, OnMissing, Variables, substitute};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[tracing::instrument(skip_all, fields(artifact_dir = %settings.artifact_dir.display()))]
pub async fn emit_artifacts(
    results: &[PushResult],
    settings: &BuildSettings,
    env: &HashMap<String, String>,
    files: &FileCache,
) -> Result<()> {
    create_dir(&settings.artifact_dir).await?;

    for result in results {
        let folder = emit_artifact(result, settings, env, files).await?;
        debug!(service = result.service_name(), folder = %folder.display(), "Wrote deployment artifact");
    }

    info!(count = results.len(), "Deployment artifacts written");
    Ok(())
}

/// 1サービス分の成果物を書き出し、出力先フォルダを返す
///
/// テンプレート中の未解決トークンはリリース時に置換するため残す。
pub async fn emit_artifact(
    result: &PushResult,
    settings: &BuildSettings,
    env: &HashMap<String, String>,
    files: &FileCache,
) -> Result<PathBuf> {
    let project = result.project();
    let service = project.service_name();

    let template = files.read(&project.deployment_template_path()).await?;
    let values: Variables = [
        ("servicename", service.to_string()),
        ("image", settings.image_with_digest(service, &result.digest)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), serde_json::Value::String(value)))
    .collect();
    let manifest = substitute(&template, &values, env, OnMissing::Keep)?;

    let folder = settings.artifact_dir.join(service);
    create_dir(&folder).await?;

    let settings_copy = folder.join(CONFIGURATION_FILE);
    tokio::fs::copy(&project.settings_file, &settings_copy)
        .await
        .map_err(|source| BuildError::ArtifactWrite {
            path: settings_copy.clone(),
            source,
        })?;

    let manifest_path = folder.join(ARTIFACT_FILE);
    tokio::fs::write(&manifest_path, manifest)
        .await
        .map_err(|source| BuildError::ArtifactWrite {
            path: manifest_path.clone(),
            source,
        })?;

    Ok(folder)
}

/// 既に存在していてもエラーにしない
async fn create_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| BuildError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOutcome;
    use crate::pipeline::BuildResult;
    use monobuild_core::{Cluster, ProjectConfig, ProjectWithPath};
    use std::fs;

    fn push_result(project_path: &Path, deploymentfile: Option<&str>) -> PushResult {
        PushResult {
            build: BuildResult {
                project: ProjectWithPath {
                    config: ProjectConfig {
                        servicename: "api".to_string(),
                        cluster: Cluster::Services,
                        builder: None,
                        deploymentfile: deploymentfile.map(str::to_string),
                    },
                    project_path: project_path.to_path_buf(),
                    settings_file: project_path.join("BuildSettings.json"),
                },
                cache_id: "abcdef123456".to_string(),
            },
            digest: "sha256:feed".to_string(),
            outcome: CacheOutcome::Pushed,
        }
    }

    #[tokio::test]
    async fn test_emits_manifest_and_settings_copy() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_path = temp_dir.path().join("src/api");
        fs::create_dir_all(&project_path).unwrap();
        fs::write(
            project_path.join("BuildSettings.json"),
            r#"{"servicename": "api", "cluster": "services"}"#,
        )
        .unwrap();
        fs::write(
            project_path.join("k8s.yaml"),
            "name: #{servicename}#\nimage: #{IMAGE}#\nregion: #{region}#\nversion: #{version}#\n",
        )
        .unwrap();

        let mut settings = BuildSettings::new("registry.example.com", temp_dir.path());
        settings.artifact_dir = temp_dir.path().join("dist");
        let env = HashMap::from([("REGION".to_string(), "eu".to_string())]);

        let result = push_result(&project_path, Some("k8s.yaml"));
        emit_artifacts(&[result], &settings, &env, &FileCache::new())
            .await
            .unwrap();

        let folder = temp_dir.path().join("dist/api");
        let manifest = fs::read_to_string(folder.join("deployment.yaml")).unwrap();
        assert_eq!(
            manifest,
            "name: api\nimage: registry.example.com/api@sha256:feed\nregion: eu\nversion: #{version}#\n"
        );
        assert!(folder.join("buildsettings.json").is_file());
    }

    #[tokio::test]
    async fn test_missing_template_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut settings = BuildSettings::new("r", temp_dir.path());
        settings.artifact_dir = temp_dir.path().join("dist");

        let result = push_result(&temp_dir.path().join("missing"), None);
        let emitted = emit_artifacts(&[result], &settings, &HashMap::new(), &FileCache::new()).await;
        assert!(matches!(emitted, Err(BuildError::Core(_))));
    }
}
