//! manual ビルダー: プロジェクトの Dockerfile をそのまま使う

use super::BuildArguments;
use monobuild_core::{BuildContext, BuildSettings, ManualBuilder, ProjectWithPath};

pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

pub fn build_arguments(
    project: &ProjectWithPath,
    builder: &ManualBuilder,
    settings: &BuildSettings,
) -> BuildArguments {
    let dockerfile = project
        .path()
        .join(builder.dockerfile.as_deref().unwrap_or(DEFAULT_DOCKERFILE));

    let context = match builder.buildcontext.unwrap_or_default() {
        BuildContext::ProjectDir => project.path().to_path_buf(),
        BuildContext::Root => settings.sources_dir.clone(),
    };

    BuildArguments::existing(dockerfile, context)
}
