use colored::Colorize;
use monobuild_build::{Pipeline, ProcessRunner};
use monobuild_core::settings::{
    DEFAULT_ARTIFACT_DIR, DEFAULT_BUILD_ID, DEFAULT_DIGEST_CACHE_FILE,
};
use monobuild_core::{BuildSettings, RegistryCredentials, Selection};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(clap::Args)]
pub struct BuildArgs {
    /// コンテナレジストリ（例: myregistry.azurecr.io）
    #[arg(long, env = "MONOBUILD_REGISTRY")]
    registry: String,

    /// イメージタグに使うビルドID
    #[arg(long, env = "BUILD_BUILDID", default_value = DEFAULT_BUILD_ID)]
    build_id: String,

    /// ソースツリーのルート
    #[arg(long, env = "BUILD_SOURCESDIRECTORY", default_value = ".")]
    sources_dir: PathBuf,

    /// 成果物の出力先（実行開始時に削除される）
    #[arg(long, env = "MONOBUILD_ARTIFACT_DIR", default_value = DEFAULT_ARTIFACT_DIR)]
    artifact_dir: PathBuf,

    /// ダイジェストキャッシュファイル
    #[arg(long, env = "MONOBUILD_DIGEST_CACHE", default_value = DEFAULT_DIGEST_CACHE_FILE)]
    digest_cache: PathBuf,

    /// 同時ビルド数の上限（省略時は CPU 数、最大 4）
    #[arg(long, env = "MONOBUILD_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// ビルドするサービス名（カンマ区切り、省略時は全サービス）
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// レジストリのユーザー名
    #[arg(long, env = "MONOBUILD_REGISTRY_USER")]
    registry_user: Option<String>,

    /// レジストリのパスワード
    #[arg(long, env = "MONOBUILD_REGISTRY_PASSWORD", hide_env_values = true)]
    registry_password: Option<String>,
}

impl BuildArgs {
    pub fn into_settings(self, debug: bool) -> BuildSettings {
        let mut settings = BuildSettings::new(self.registry, &self.sources_dir);
        settings.build_id = self.build_id;
        settings.artifact_dir = self.artifact_dir;
        settings.digest_cache_path = self.digest_cache;
        settings.debug = debug;
        settings.max_concurrency = self.max_concurrency;

        if !self.only.is_empty() {
            settings.selection = Selection::only(self.only);
        }

        if let (Some(username), Some(password)) = (self.registry_user, self.registry_password) {
            settings.credentials = Some(RegistryCredentials { username, password });
        }

        settings
    }
}

pub async fn handle(
    args: BuildArgs,
    debug: bool,
    env: HashMap<String, String>,
) -> anyhow::Result<()> {
    let settings = args.into_settings(debug);

    println!("{}", "ビルドを開始します...".blue());
    println!("  → Registry: {}", settings.registry.cyan());
    println!("  → Build ID: {}", settings.build_id.cyan());
    println!(
        "  → Sources: {}",
        settings.sources_dir.display().to_string().cyan()
    );
    if let Selection::Only(names) = &settings.selection {
        let names: Vec<_> = names.iter().map(String::as_str).collect();
        println!("  → Only: {}", names.join(", ").cyan());
    }

    let artifact_dir = settings.artifact_dir.clone();
    let pipeline = Pipeline::new(settings, Arc::new(ProcessRunner), env);
    let results = pipeline
        .run()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!();
    if results.is_empty() {
        println!("{}", "ビルド対象のサービスはありません".dimmed());
        return Ok(());
    }

    for result in &results {
        let source = if result.is_cached() {
            "cached".yellow()
        } else {
            "pushed".green()
        };
        println!(
            "  {} {} {} ({})",
            "✓".green(),
            result.service_name().cyan(),
            result.digest.dimmed(),
            source
        );
    }

    let cached = results.iter().filter(|r| r.is_cached()).count();
    println!();
    println!(
        "{}",
        format!(
            "{} サービスのビルドが完了しました（キャッシュ: {}）",
            results.len(),
            cached
        )
        .green()
    );
    println!(
        "  → 成果物: {}",
        artifact_dir.display().to_string().cyan()
    );

    Ok(())
}
