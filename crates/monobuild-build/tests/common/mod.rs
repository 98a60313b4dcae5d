use async_trait::async_trait;
use monobuild_build::{BuildError, CommandOutput, CommandRunner, CommandSpec, Result};
use monobuild_core::BuildSettings;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub const REGISTRY: &str = "registry.example.com";
pub const DIGEST: &str = "sha256:0123456789abcdef";

/// docker の代わりに呼ばれるランナー
///
/// 同時実行数の最大値と、実行されたコマンドを記録する。
#[derive(Default)]
pub struct FakeRunner {
    pub running: AtomicUsize,
    pub max_running: AtomicUsize,
    pub commands: Mutex<Vec<CommandSpec>>,
    /// このサービスのビルドを失敗させる
    pub fail_service: Option<String>,
    /// 全サービスで同じビルドキャッシュIDを返す
    pub shared_cache_id: bool,
    pub delay: Duration,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    pub fn count(&self, subcommand: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|spec| spec.args.first().map(String::as_str) == Some(subcommand))
            .count()
    }

    fn respond(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let subcommand = spec.args.first().map(String::as_str).unwrap_or_default();
        match subcommand {
            "build" => {
                let tag = &spec.args[4];
                let service = service_from_tag(tag);
                if self.fail_service.as_deref() == Some(service.as_str()) {
                    return Err(BuildError::CommandFailed {
                        command: spec.display(),
                        code: Some(1),
                        stderr: "COPY failed".to_string(),
                    });
                }
                let cache_id = if self.shared_cache_id {
                    "000000shared".to_string()
                } else {
                    format!("{:0>12}", service)
                };
                Ok(CommandOutput {
                    stdout: format!(
                        "Step 1/2 : FROM alpine\nSuccessfully built {}\nSuccessfully tagged {}\n",
                        cache_id, tag
                    ),
                    stderr: String::new(),
                })
            }
            "push" => Ok(CommandOutput {
                stdout: format!("latest: digest: {} size: 1573\n", DIGEST),
                stderr: String::new(),
            }),
            _ => Ok(CommandOutput::default()),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(spec.clone());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        self.respond(spec)
    }
}

/// `registry/service:buildid` からサービス名を取り出す
fn service_from_tag(tag: &str) -> String {
    let name = tag.rsplit('/').next().unwrap_or(tag);
    name.split(':').next().unwrap_or(name).to_string()
}

/// テスト用のソースツリー
pub struct TestTree {
    pub root: TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn sources(&self) -> PathBuf {
        self.root.path().join("src")
    }

    /// manual ビルダーのプロジェクトを追加
    pub fn add_project(&self, dir: &str, service: &str, cluster: &str) -> PathBuf {
        let path = self.sources().join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(
            path.join("buildsettings.json"),
            format!(
                r#"{{"servicename": "{}", "cluster": "{}", "builder": {{"type": "manual"}}}}"#,
                service, cluster
            ),
        )
        .unwrap();
        fs::write(path.join("Dockerfile"), "FROM alpine\n").unwrap();
        fs::write(
            path.join("deployment.yaml"),
            "name: #{servicename}#\nimage: #{image}#\nversion: #{version}#\n",
        )
        .unwrap();
        path
    }

    #[allow(dead_code)]
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.sources().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn settings(&self) -> BuildSettings {
        let mut settings = BuildSettings::new(REGISTRY, self.sources());
        settings.build_id = "42".to_string();
        settings.artifact_dir = self.root.path().join("dist");
        settings.digest_cache_path = self.root.path().join(".digestcache");
        settings
    }

    pub fn artifact(&self, service: &str, file: &str) -> PathBuf {
        self.root.path().join("dist").join(service).join(file)
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.root.path()
    }
}
