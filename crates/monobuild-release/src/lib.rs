//! monobuild release
//!
//! ビルドで出力された成果物を再発見し、サービスごとの環境変数でトークンを置換して
//! クラスターごとの `{cluster}_deployment.yaml` に結合します。

pub mod combiner;
pub mod error;

pub use combiner::{
    NODEPLOY_KEY, ReleaseManifest, env_for_service, is_skipped, prepare_release,
};
pub use error::{ReleaseError, Result};
