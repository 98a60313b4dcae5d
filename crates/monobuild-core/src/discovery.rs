//! 設定ファイル自動発見機能
//!
//! ソースツリーを再帰的に走査して `buildsettings.json` を持つプロジェクトを発見します。

use crate::error::{CoreError, Result};
use crate::model::{ProjectConfig, ProjectWithPath};
use crate::settings::{CONFIGURATION_FILE, EXCLUDED_DIRS};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::DirEntry;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// ビルド対象の選択（`--only` オプション）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// 全プロジェクト
    #[default]
    All,
    /// 指定されたサービス名のみ
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, service_name: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(names) => names.contains(service_name),
        }
    }
}

/// ソースツリーからプロジェクトを発見
///
/// - 設定ファイル名は大文字小文字を区別しない
/// - 選択されたプロジェクトのディレクトリより下は探索しない
/// - `EXCLUDED_DIRS` に含まれるディレクトリは探索しない
/// - 設定ファイルのパースに失敗した場合は探索全体を中断する
/// - サービス名が重複している場合はエラー
/// - `root` がディレクトリでない場合はエラー
///
/// 返り値の順序はディレクトリ走査順（名前順）で、呼び出し側は順序に依存しないこと。
#[tracing::instrument(skip(root, selection), fields(root = %root.display()))]
pub fn discover(root: &Path, selection: &Selection) -> Result<Vec<ProjectWithPath>> {
    if !root.is_dir() {
        return Err(CoreError::DiscoveryError {
            path: root.to_path_buf(),
            message: "ディレクトリが存在しません".to_string(),
        });
    }

    let mut projects = Vec::new();
    let mut visited = HashSet::new();

    visit_dir(root, selection, &mut projects, &mut visited)?;
    ensure_unique_service_names(&projects)?;

    info!(project_count = projects.len(), "Discovered projects");
    Ok(projects)
}

/// 設定ファイルを読み込んでパース
pub fn read_project_config(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    let config: ProjectConfig =
        serde_json::from_str(&content).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

    if config.servicename.trim().is_empty() {
        return Err(CoreError::InvalidConfig(format!(
            "servicename が空です: {}",
            path.display()
        )));
    }

    Ok(config)
}

/// ディレクトリを再帰的に走査
fn visit_dir(
    dir: &Path,
    selection: &Selection,
    projects: &mut Vec<ProjectWithPath>,
    visited: &mut HashSet<PathBuf>,
) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    // 正規化されたパスでシンボリックリンクのループを検出
    let canonical_dir = dir.canonicalize().map_err(|e| CoreError::DiscoveryError {
        path: dir.to_path_buf(),
        message: format!("パスの正規化に失敗: {}", e),
    })?;
    if !visited.insert(canonical_dir.clone()) {
        warn!(dir = %canonical_dir.display(), "Symlink loop detected, skipping");
        return Ok(());
    }

    let entries = read_sorted_entries(dir)?;

    let settings_file = entries
        .iter()
        .find(|entry| is_configuration_file(entry))
        .map(DirEntry::path);

    if let Some(settings_file) = settings_file {
        info!(dir = %dir.display(), "Found configuration file");
        let config = read_project_config(&settings_file)?;

        if selection.includes(&config.servicename) {
            projects.push(ProjectWithPath {
                config,
                project_path: dir.to_path_buf(),
                settings_file,
            });
            return Ok(());
        }

        debug!(
            service = %config.servicename,
            "Skipping project because it is not part of the selection"
        );
    }

    for entry in &entries {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if EXCLUDED_DIRS.iter().any(|excluded| name == *excluded) {
            debug!(dir = %path.display(), "Skipping excluded directory");
            continue;
        }
        visit_dir(&path, selection, projects, visited)?;
    }

    Ok(())
}

fn read_sorted_entries(dir: &Path) -> Result<Vec<DirEntry>> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| CoreError::DiscoveryError {
        path: dir.to_path_buf(),
        message: format!("ディレクトリの読み込みに失敗: {}", e),
    })?;

    let mut entries = read_dir
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CoreError::DiscoveryError {
            path: dir.to_path_buf(),
            message: format!("ディレクトリエントリの読み込みに失敗: {}", e),
        })?;
    entries.sort_by_key(DirEntry::file_name);
    Ok(entries)
}

fn is_configuration_file(entry: &DirEntry) -> bool {
    entry.path().is_file()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.eq_ignore_ascii_case(CONFIGURATION_FILE))
}

fn ensure_unique_service_names(projects: &[ProjectWithPath]) -> Result<()> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for project in projects {
        if let Some(first) = seen.insert(project.service_name(), project.path()) {
            return Err(CoreError::DuplicateService {
                name: project.service_name().to_string(),
                first: first.to_path_buf(),
                second: project.project_path.clone(),
            });
        }
    }
    Ok(())
}
