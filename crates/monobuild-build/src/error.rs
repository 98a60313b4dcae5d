use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Core(#[from] monobuild_core::CoreError),

    #[error("未対応のビルダーです: サービス '{service}'")]
    UnsupportedBuilder { service: String },

    #[error("プロジェクトファイルが見つかりません: {0}")]
    ProjectFileNotFound(PathBuf),

    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("コマンドの実行に失敗しました: {command} (exit code: {code:?})\n{stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("コマンドを起動できません: {command}\n理由: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{service}' のコマンド出力を解析できません: {message}")]
    OutputParse { service: String, message: String },

    #[error("ダイジェストキャッシュを書き込めません: {path}\n理由: {message}")]
    CachePersist { path: PathBuf, message: String },

    #[error("成果物を書き込めません: {path}\n理由: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ビルドタスクが異常終了しました: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::ProjectFileNotFound(path) => {
                format!(
                    ".csproj ファイルが見つかりません: {}\n\
                     \n\
                     解決方法:\n\
                     1. プロジェクトディレクトリに .csproj があるか確認してください\n\
                     2. Dockerfile を用意して builder を manual に変更してください",
                    path.display()
                )
            }
            BuildError::UnsupportedBuilder { service } => {
                format!(
                    "サービス '{}' の builder.type が未対応です\n\
                     \n\
                     使用できる type: manual, dotnet, nodejs",
                    service
                )
            }
            BuildError::OutputParse { service, message } => {
                format!(
                    "'{}' の docker 出力を解析できませんでした: {}\n\
                     \n\
                     docker のバージョンと出力形式を確認してください。",
                    service, message
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
