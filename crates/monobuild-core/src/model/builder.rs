//! ビルダー定義
//!
//! `buildsettings.json` の `builder` フィールド。`type` タグでビルド方式を選択する。
//!
//! ```json
//! { "type": "nodejs", "nodeversion": "18", "runcommand": "node index.js" }
//! ```

use serde::{Deserialize, Serialize};

/// ビルダー定義（タグ付きユニオン）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BuilderConfig {
    /// プロジェクトが用意した Dockerfile をそのまま使う
    Manual(ManualBuilder),
    /// .csproj から Dockerfile を生成する
    Dotnet(DotnetBuilder),
    /// package.json プロジェクト向けの Dockerfile を生成する
    #[serde(rename = "nodejs")]
    Node(NodeBuilder),
    /// 未対応の type（ビルド時にエラーになる）
    #[serde(other, skip_serializing)]
    Unsupported,
}

impl BuilderConfig {
    /// ログ表示用の種別名
    pub fn kind(&self) -> &'static str {
        match self {
            BuilderConfig::Manual(_) => "manual",
            BuilderConfig::Dotnet(_) => "dotnet",
            BuilderConfig::Node(_) => "nodejs",
            BuilderConfig::Unsupported => "unsupported",
        }
    }
}

/// ビルドコンテキストの選択
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildContext {
    /// ソースツリーのルート（デフォルト）
    #[default]
    Root,
    /// プロジェクトディレクトリ
    ProjectDir,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualBuilder {
    #[serde(default)]
    pub buildcontext: Option<BuildContext>,
    /// プロジェクトディレクトリからの Dockerfile 名（デフォルト: Dockerfile）
    #[serde(default)]
    pub dockerfile: Option<String>,
}

/// .NET ランタイムイメージの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DotnetRuntime {
    Runtime,
    Aspnet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotnetBuilder {
    /// 明示的なランタイム指定。省略時はパッケージ参照から推定する
    #[serde(default)]
    pub dotnetruntime: Option<DotnetRuntime>,
    /// SDK / ランタイムイメージのタグ（デフォルト: 3.1）
    #[serde(default)]
    pub dotnetversion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBuilder {
    pub nodeversion: String,
    #[serde(default)]
    pub buildcommand: Option<String>,
    pub runcommand: String,
}
