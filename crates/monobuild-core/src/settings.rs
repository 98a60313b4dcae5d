//! 実行時設定
//!
//! CLI 引数と環境変数から組み立てられる、1回のビルド / リリース実行の設定。

use crate::discovery::Selection;
use crate::paths;
use std::fmt;
use std::path::{Path, PathBuf};

/// プロジェクト設定ファイル名（大文字小文字を区別しない）
pub const CONFIGURATION_FILE: &str = "buildsettings.json";

/// デプロイメントテンプレートのデフォルト名
pub const DEFAULT_DEPLOYMENT_FILE: &str = "deployment.yaml";

/// 出力されるマニフェストのファイル名
pub const ARTIFACT_FILE: &str = "deployment.yaml";

/// 探索しないディレクトリ
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", "build", "bin", "obj", ".git"];

pub const DEFAULT_DIGEST_CACHE_FILE: &str = ".digestcache";
pub const DEFAULT_ARTIFACT_DIR: &str = "./Buildscripts/dist";
pub const DEFAULT_BUILD_ID: &str = "Not_Configured";

/// 同時に実行するビルドの上限
pub const MAX_CONCURRENT_BUILDS: usize = 4;

/// レジストリ認証情報
#[derive(Clone)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// ビルド実行の設定
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// コンテナレジストリ（例: myregistry.azurecr.io）
    pub registry: String,
    /// イメージタグに使うビルドID
    pub build_id: String,
    /// ソースツリーのルート（絶対パス）
    pub sources_dir: PathBuf,
    /// 成果物の出力先（実行開始時に削除される）
    pub artifact_dir: PathBuf,
    /// ダイジェストキャッシュファイル
    pub digest_cache_path: PathBuf,
    pub debug: bool,
    /// 同時ビルド数の上限（省略時は CPU 数）
    pub max_concurrency: Option<usize>,
    pub selection: Selection,
    pub credentials: Option<RegistryCredentials>,
}

impl BuildSettings {
    /// デフォルト値で設定を作成
    ///
    /// `sources_dir` は絶対パスに正規化される。
    pub fn new(registry: impl Into<String>, sources_dir: impl AsRef<Path>) -> Self {
        Self {
            registry: registry.into(),
            build_id: DEFAULT_BUILD_ID.to_string(),
            sources_dir: paths::absolute(sources_dir.as_ref()),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            digest_cache_path: PathBuf::from(DEFAULT_DIGEST_CACHE_FILE),
            debug: false,
            max_concurrency: None,
            selection: Selection::All,
            credentials: None,
        }
    }

    /// ビルド時のイメージ参照: `{registry}/{service}:{build_id}`
    pub fn image_tag(&self, service_name: &str) -> String {
        format!("{}/{}:{}", self.registry, service_name, self.build_id)
    }

    /// ダイジェスト固定のイメージ参照: `{registry}/{service}@{digest}`
    pub fn image_with_digest(&self, service_name: &str, digest: &str) -> String {
        format!("{}/{}@{}", self.registry, service_name, digest)
    }

    /// 同時ビルド数（デバッグ時は 1）
    ///
    /// `max_concurrency` が指定されていれば CPU 数の代わりに使う。
    /// どちらの場合も `MAX_CONCURRENT_BUILDS` を超えない。
    pub fn concurrency(&self) -> usize {
        if self.debug {
            return 1;
        }
        let requested = match self.max_concurrency {
            Some(limit) => limit,
            None => std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1),
        };
        requested.clamp(1, MAX_CONCURRENT_BUILDS)
    }
}

/// リリース実行の設定
#[derive(Debug, Clone)]
pub struct ReleaseSettings {
    /// ビルド成果物が展開されたディレクトリ
    pub artifacts_dir: PathBuf,
}

impl ReleaseSettings {
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_references() {
        let mut settings = BuildSettings::new("registry.example.com", "/src");
        settings.build_id = "1234".to_string();

        assert_eq!(settings.image_tag("api"), "registry.example.com/api:1234");
        assert_eq!(
            settings.image_with_digest("api", "sha256:abc"),
            "registry.example.com/api@sha256:abc"
        );
    }

    #[test]
    fn test_concurrency_bounds() {
        let mut settings = BuildSettings::new("r", "/src");
        let concurrency = settings.concurrency();
        assert!(concurrency >= 1);
        assert!(concurrency <= MAX_CONCURRENT_BUILDS);

        settings.debug = true;
        assert_eq!(settings.concurrency(), 1);
    }

    #[test]
    fn test_explicit_concurrency_limit() {
        let mut settings = BuildSettings::new("r", "/src");

        settings.max_concurrency = Some(3);
        assert_eq!(settings.concurrency(), 3);

        settings.max_concurrency = Some(16);
        assert_eq!(settings.concurrency(), MAX_CONCURRENT_BUILDS);

        settings.max_concurrency = Some(0);
        assert_eq!(settings.concurrency(), 1);

        settings.max_concurrency = Some(2);
        settings.debug = true;
        assert_eq!(settings.concurrency(), 1);
    }

    #[test]
    fn test_credentials_are_redacted() {
        let creds = RegistryCredentials {
            username: "ci".to_string(),
            password: "hunter2".to_string(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("ci"));
        assert!(!printed.contains("hunter2"));
    }
}
