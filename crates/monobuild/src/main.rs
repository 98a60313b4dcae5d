mod commands;

use clap::{Parser, Subcommand};
use commands::build::BuildArgs;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "monobuild")]
#[command(about = "モノレポのサービスをまとめてビルドし、デプロイマニフェストを出力する", long_about = None)]
struct Cli {
    /// デバッグログを出力する（ビルドは1つずつ実行される）
    #[arg(long, global = true, env = "BUILD_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 全サービスをビルド・プッシュして成果物を出力
    Build(BuildArgs),
    /// 成果物をクラスターごとのマニフェストに結合
    Release {
        /// 成果物が展開されたディレクトリ
        #[arg(long, env = "SYSTEM_ARTIFACTSDIRECTORY", default_value = ".")]
        artifacts_dir: PathBuf,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    // ライブラリには環境変数をこのマップで渡す
    let env: HashMap<String, String> = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect();

    match cli.command {
        Commands::Build(args) => {
            commands::build::handle(args, cli.debug, env).await?;
        }
        Commands::Release { artifacts_dir } => {
            commands::release::handle(artifacts_dir, env).await?;
        }
        Commands::Version => {
            println!("monobuild {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// ログは stderr に出力する（`RUST_LOG` が優先）
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
