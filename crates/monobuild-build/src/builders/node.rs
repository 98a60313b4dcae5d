//! nodejs ビルダー
//!
//! 親ディレクトリのロックファイルからインストールコマンドを決め、Dockerfile を生成します。
//! ビルドコンテキストはプロジェクトディレクトリです。

use super::{BuildArguments, render, templates, write_dockerfile};
use crate::error::Result;
use monobuild_core::{NodeBuilder, ProjectWithPath};
use std::path::Path;

const YARN_INSTALL: &str = "RUN yarn install\nRUN yarn audit";
const NPM_CI: &str = "RUN npm ci\nRUN npm audit";
const NPM_INSTALL: &str = "RUN npm install\nRUN npm audit";

pub async fn build_arguments(
    project: &ProjectWithPath,
    builder: &NodeBuilder,
) -> Result<BuildArguments> {
    let install_and_audit = install_and_audit(project.path()).await;

    let build_command = builder
        .buildcommand
        .as_deref()
        .filter(|command| !command.trim().is_empty())
        .map(|command| format!("RUN {}", command))
        .unwrap_or_default();

    let content = render(
        templates::NODE_DOCKERFILE,
        &[
            ("INSTALL_AND_AUDIT", install_and_audit.to_string()),
            ("BUILD_COMMAND", build_command),
            ("RUN_COMMAND", builder.runcommand.clone()),
            ("NODE_VERSION", builder.nodeversion.clone()),
        ],
    )?;

    write_dockerfile(&content, project.path().to_path_buf())
}

/// yarn.lock → yarn、package-lock.json → npm ci、どちらもなければ npm install
async fn install_and_audit(project_dir: &Path) -> &'static str {
    let parent = project_dir.parent().unwrap_or(project_dir);

    if is_file(&parent.join("yarn.lock")).await {
        YARN_INSTALL
    } else if is_file(&parent.join("package-lock.json")).await {
        NPM_CI
    } else {
        NPM_INSTALL
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monobuild_core::{BuilderConfig, Cluster, ProjectConfig};
    use std::fs;

    fn node_project(root: &Path) -> (ProjectWithPath, NodeBuilder) {
        let project_path = root.join("web");
        fs::create_dir_all(&project_path).unwrap();
        let builder = NodeBuilder {
            nodeversion: "18".to_string(),
            buildcommand: Some("npm run build".to_string()),
            runcommand: "[\"node\", \"dist/index.js\"]".to_string(),
        };
        let project = ProjectWithPath {
            config: ProjectConfig {
                servicename: "web".to_string(),
                cluster: Cluster::Services,
                builder: Some(BuilderConfig::Node(builder.clone())),
                deploymentfile: None,
            },
            settings_file: project_path.join("buildsettings.json"),
            project_path,
        };
        (project, builder)
    }

    #[tokio::test]
    async fn test_generates_dockerfile_with_npm_install() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (project, builder) = node_project(temp_dir.path());

        let args = build_arguments(&project, &builder).await.unwrap();
        let dockerfile = fs::read_to_string(&args.dockerfile).unwrap();

        assert_eq!(args.context, project.project_path);
        assert!(dockerfile.starts_with("FROM node:18-alpine"));
        assert!(dockerfile.contains("RUN npm install\nRUN npm audit"));
        assert!(dockerfile.contains("RUN npm run build"));
        assert!(dockerfile.contains("CMD [\"node\", \"dist/index.js\"]"));
        assert!(!dockerfile.contains("#{"));
    }

    #[tokio::test]
    async fn test_lock_files_in_parent_select_install_command() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (project, _) = node_project(temp_dir.path());

        fs::write(temp_dir.path().join("package-lock.json"), "{}").unwrap();
        assert_eq!(install_and_audit(project.path()).await, NPM_CI);

        fs::write(temp_dir.path().join("yarn.lock"), "").unwrap();
        assert_eq!(install_and_audit(project.path()).await, YARN_INSTALL);
    }

    #[tokio::test]
    async fn test_lock_file_inside_project_is_ignored() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (project, _) = node_project(temp_dir.path());
        fs::write(project.path().join("yarn.lock"), "").unwrap();

        assert_eq!(install_and_audit(project.path()).await, NPM_INSTALL);
    }

    #[tokio::test]
    async fn test_build_command_is_optional() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (project, mut builder) = node_project(temp_dir.path());
        builder.buildcommand = None;

        let args = build_arguments(&project, &builder).await.unwrap();
        let dockerfile = fs::read_to_string(&args.dockerfile).unwrap();
        assert!(!dockerfile.contains("RUN npm run build"));
        assert!(!dockerfile.contains("BUILD_COMMAND"));
    }
}
