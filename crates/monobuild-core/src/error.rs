use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("設定ファイルのパースエラー: {path}\n理由: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("ファイル発見エラー: {path}\n理由: {message}")]
    DiscoveryError { path: PathBuf, message: String },

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error(
        "サービス名 '{name}' が重複しています\n  - {first}\n  - {second}\nヒント: servicename はビルド対象全体で一意にしてください"
    )]
    DuplicateService {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("置換する値が見つかりません: {key}")]
    MissingToken { key: String },
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        CoreError::IoError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
