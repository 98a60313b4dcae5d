//! プロジェクト設定

use super::builder::BuilderConfig;
use crate::settings::DEFAULT_DEPLOYMENT_FILE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// デプロイ先クラスター
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Controller,
    Services,
}

impl Cluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cluster::Controller => "controller",
            Cluster::Services => "services",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `buildsettings.json` の内容
///
/// ```json
/// {
///   "servicename": "api",
///   "cluster": "services",
///   "builder": { "type": "manual", "dockerfile": "Dockerfile.prod" },
///   "deploymentfile": "k8s.yaml"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub servicename: String,
    pub cluster: Cluster,
    #[serde(default)]
    pub builder: Option<BuilderConfig>,
    #[serde(default)]
    pub deploymentfile: Option<String>,
}

impl ProjectConfig {
    /// デプロイメントテンプレートのファイル名
    pub fn deployment_file(&self) -> &str {
        self.deploymentfile
            .as_deref()
            .unwrap_or(DEFAULT_DEPLOYMENT_FILE)
    }
}

/// 発見されたプロジェクト（設定 + ディレクトリ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectWithPath {
    pub config: ProjectConfig,
    /// プロジェクトディレクトリ
    pub project_path: PathBuf,
    /// 読み込んだ設定ファイル（大文字小文字は実ファイルのまま）
    pub settings_file: PathBuf,
}

impl ProjectWithPath {
    pub fn service_name(&self) -> &str {
        &self.config.servicename
    }

    pub fn cluster(&self) -> Cluster {
        self.config.cluster
    }

    pub fn deployment_template_path(&self) -> PathBuf {
        self.project_path.join(self.config.deployment_file())
    }

    pub fn path(&self) -> &Path {
        &self.project_path
    }
}
