use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error(transparent)]
    Core(#[from] monobuild_core::CoreError),

    #[error("デプロイメントファイルを読み込めません: {path}\n理由: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("リリースマニフェストを書き込めません: {path}\n理由: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReleaseError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            ReleaseError::Core(monobuild_core::CoreError::MissingToken { key }) => {
                let env_key = key.to_uppercase().replace('.', "_");
                format!(
                    "トークン '{}' の値が見つかりません\n\
                     \n\
                     解決方法:\n\
                     1. <SERVICE>_{} の形式で環境変数を設定してください\n\
                     2. またはサービス共通の環境変数 {} を設定してください",
                    key, env_key, env_key
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReleaseError>;
