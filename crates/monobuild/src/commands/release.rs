use colored::Colorize;
use monobuild_core::ReleaseSettings;
use monobuild_release::prepare_release;
use std::collections::HashMap;
use std::path::PathBuf;

pub async fn handle(artifacts_dir: PathBuf, env: HashMap<String, String>) -> anyhow::Result<()> {
    println!("{}", "リリースマニフェストを作成中...".blue());
    println!(
        "  → Artifacts: {}",
        artifacts_dir.display().to_string().cyan()
    );

    let settings = ReleaseSettings::new(artifacts_dir);
    let manifests = prepare_release(&settings, &env)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!();
    if manifests.is_empty() {
        println!("{}", "出力するマニフェストはありません".dimmed());
        return Ok(());
    }

    for manifest in &manifests {
        println!(
            "  {} {} ({})",
            "✓".green(),
            manifest.path.display().to_string().cyan(),
            manifest.services.join(", ")
        );
    }

    Ok(())
}
