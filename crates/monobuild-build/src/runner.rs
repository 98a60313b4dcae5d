//! 外部コマンド実行
//!
//! docker CLI などの外部ツールをサブプロセスとして実行します。
//! テストでは `CommandRunner` を差し替えてサブプロセスを起動せずに検証します。

use crate::error::{BuildError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// 実行するコマンド
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
    /// 標準入力に書き込む内容（ログには出力しない）
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// ログ・エラー表示用のコマンドライン
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// コマンドの出力（全体をバッファしたもの）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// 外部コマンド実行の抽象
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// コマンドを実行し、終了コードが 0 以外なら `CommandFailed` を返す
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// tokio::process で実際にサブプロセスを起動する実装
///
/// 出力は行単位でログに流しつつ、全体を溜めてから返す。
/// stdout は debug、stderr は info レベルで出力する。
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[derive(Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd.envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        debug!("Running: {}", spec.display());

        let mut child = cmd.spawn().map_err(|source| BuildError::Spawn {
            command: spec.display(),
            source,
        })?;

        if let (Some(input), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await?;
            // drop で stdin を閉じる
        }

        let (stdout, stderr) = tokio::try_join!(
            collect_output(child.stdout.take(), OutputStream::Stdout),
            collect_output(child.stderr.take(), OutputStream::Stderr),
        )?;

        let status = child.wait().await?;
        if !status.success() {
            return Err(BuildError::CommandFailed {
                command: spec.display(),
                code: status.code(),
                stderr,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// 出力を行単位でログに流しながら全体を集める
async fn collect_output<R>(reader: Option<R>, stream: OutputStream) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(String::new());
    };

    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut line = Vec::new();

    while reader.read_until(b'\n', &mut line).await? > 0 {
        let text = String::from_utf8_lossy(&line);
        let trimmed = text.trim_end();
        match stream {
            OutputStream::Stdout => debug!("{}", trimmed),
            OutputStream::Stderr => info!("{}", trimmed),
        }
        collected.push_str(&text);
        line.clear();
    }

    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("docker")
            .arg("push")
            .arg("registry/api:1")
            .stdin("secret");
        assert_eq!(spec.display(), "docker push registry/api:1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_collects_both_streams() {
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo out-line; echo err-line 1>&2");
        let output = ProcessRunner.run(&spec).await.unwrap();
        assert_eq!(output.stdout, "out-line\n");
        assert_eq!(output.stderr, "err-line\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_non_zero_exit() {
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo broken 1>&2; exit 3");
        match ProcessRunner.run(&spec).await {
            Err(BuildError::CommandFailed { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("broken"));
            }
            other => panic!("Expected CommandFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_writes_stdin() {
        let spec = CommandSpec::new("cat").stdin("from-stdin");
        let output = ProcessRunner.run(&spec).await.unwrap();
        assert_eq!(output.stdout, "from-stdin");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_env_and_cwd() {
        let temp_dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo $MONOBUILD_TEST_VALUE; pwd")
            .env("MONOBUILD_TEST_VALUE", "hello")
            .current_dir(temp_dir.path());
        let output = ProcessRunner.run(&spec).await.unwrap();
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("hello"));
        let cwd = std::path::PathBuf::from(lines.next().unwrap());
        assert_eq!(
            cwd.canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_process_runner_missing_program() {
        let spec = CommandSpec::new("monobuild-definitely-not-a-program");
        let result = ProcessRunner.run(&spec).await;
        assert!(matches!(result, Err(BuildError::Spawn { .. })));
    }
}
