//! リリースマニフェストの結合
//!
//! 成果物ディレクトリの各サービスについて、`{SERVICE}_*` 形式の環境変数を
//! そのサービス専用の値として使ってトークンを置換し、クラスターごとに結合します。
//! 値が見つからないトークンはエラーになります。

use crate::error::{ReleaseError, Result};
use monobuild_core::settings::ARTIFACT_FILE;
use monobuild_core::{
    Cluster, OnMissing, ProjectWithPath, ReleaseSettings, Selection, Variables, discover,
    substitute,
};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, info};

/// このキーが設定されたサービスはリリースに含めない（例: `API_NODEPLOY=true`）
pub const NODEPLOY_KEY: &str = "NODEPLOY";

/// マニフェスト間の区切り
const DOCUMENT_SEPARATOR: &str = "\n---\n";

/// サービス名の後ろに続く区切り文字（順に試す）
const PREFIX_SEPARATORS: &[&str] = &["-", "_", ".", ""];

/// 書き出したクラスターごとのマニフェスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseManifest {
    pub cluster: Cluster,
    pub path: PathBuf,
    pub services: Vec<String>,
}

/// サービス専用の値を環境変数から取り出す
///
/// 大文字化したサービス名で始まる変数から、サービス名と区切り文字を1回だけ取り除く。
/// サービス名の `-` は `_` としても照合する（`my-api` → `MY_API_VERSION`）。空の値は無視する。
///
/// 複数の変数が同じキーになる場合は、サービス名そのままの接頭辞、
/// `PREFIX_SEPARATORS` の順、変数名の順で先にあるものを使う。
pub fn env_for_service(service_name: &str, env: &HashMap<String, String>) -> Variables {
    let upper = service_name.to_uppercase();
    let mut prefixes = vec![upper.clone()];
    if upper.contains('-') {
        prefixes.push(upper.replace('-', "_"));
    }

    let mut candidates: Vec<(usize, usize, &str, &str, &str)> = env
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .filter_map(|(key, value)| {
            prefixes
                .iter()
                .enumerate()
                .find_map(|(prefix_rank, prefix)| {
                    strip_service_prefix(key, prefix)
                        .map(|(separator_rank, stripped)| (prefix_rank, separator_rank, stripped))
                })
                .map(|(prefix_rank, separator_rank, stripped)| {
                    (prefix_rank, separator_rank, key.as_str(), stripped, value.as_str())
                })
        })
        .collect();
    candidates.sort();

    let mut values = Variables::new();
    for (_, _, _, stripped, value) in candidates {
        values
            .entry(stripped.to_string())
            .or_insert_with(|| serde_json::Value::String(value.to_string()));
    }
    values
}

/// 取り除いた区切り文字の順位と残りのキー
fn strip_service_prefix<'a>(key: &'a str, prefix: &str) -> Option<(usize, &'a str)> {
    let rest = key.strip_prefix(prefix)?;
    PREFIX_SEPARATORS
        .iter()
        .enumerate()
        .find_map(|(rank, separator)| rest.strip_prefix(separator).map(|stripped| (rank, stripped)))
}

/// `NODEPLOY` が `false` / `0` 以外の値で設定されているか
pub fn is_skipped(values: &Variables) -> bool {
    values
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(NODEPLOY_KEY))
        .and_then(|(_, value)| value.as_str())
        .map(|flag| {
            let flag = flag.trim();
            !flag.is_empty() && !flag.eq_ignore_ascii_case("false") && flag != "0"
        })
        .unwrap_or(false)
}

/// 成果物からクラスターごとのリリースマニフェストを作成
///
/// `{artifacts_dir}/{cluster}_deployment.yaml` を書き出し、その一覧を返す。
#[tracing::instrument(skip(env), fields(artifacts_dir = %settings.artifacts_dir.display()))]
pub async fn prepare_release(
    settings: &ReleaseSettings,
    env: &HashMap<String, String>,
) -> Result<Vec<ReleaseManifest>> {
    let projects = discover(&settings.artifacts_dir, &Selection::All)?;
    info!(projects = projects.len(), "Preparing release");

    let mut groups: BTreeMap<Cluster, Vec<(String, String)>> = BTreeMap::new();
    for project in &projects {
        let service = project.service_name();
        let values = env_for_service(service, env);
        if is_skipped(&values) {
            info!(service = service, "Skipping service marked with {}", NODEPLOY_KEY);
            continue;
        }

        let manifest = render_manifest(project, &values, env).await?;
        groups
            .entry(project.cluster())
            .or_default()
            .push((service.to_string(), manifest));
    }

    let mut written = Vec::new();
    for (cluster, entries) in groups {
        let path = settings
            .artifacts_dir
            .join(format!("{}_{}", cluster, ARTIFACT_FILE));
        let (services, manifests): (Vec<_>, Vec<_>) = entries.into_iter().unzip();

        info!(path = %path.display(), services = ?services, "Writing release manifest");
        tokio::fs::write(&path, manifests.join(DOCUMENT_SEPARATOR))
            .await
            .map_err(|source| ReleaseError::ManifestWrite {
                path: path.clone(),
                source,
            })?;

        written.push(ReleaseManifest {
            cluster,
            path,
            services,
        });
    }

    Ok(written)
}

async fn render_manifest(
    project: &ProjectWithPath,
    values: &Variables,
    env: &HashMap<String, String>,
) -> Result<String> {
    let path = project.path().join(ARTIFACT_FILE);
    let template = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ReleaseError::ManifestRead {
            path: path.clone(),
            source,
        })?;

    debug!(
        service = project.service_name(),
        keys = ?values.keys().collect::<Vec<_>>(),
        "Substituting release tokens"
    );
    Ok(substitute(&template, values, env, OnMissing::Error)?)
}
