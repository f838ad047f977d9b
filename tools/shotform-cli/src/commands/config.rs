//! Create and check scoring config files.

use std::path::PathBuf;

use shotform_pose_model::scoring_config::ScoreConfig;

pub fn init(output: PathBuf, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    ScoreConfig::default()
        .save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write config: {e}"))?;

    println!("Wrote default scoring config to {}", output.display());
    Ok(())
}

pub fn validate(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating scoring config at: {}", path.display());

    let content = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let config: ScoreConfig = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))?;

    let errors = config.validate();
    if errors.is_empty() {
        println!(
            "  Weights: legs {} | upper {} | balance {} | align {}",
            config.weights.legs, config.weights.upper, config.weights.balance, config.weights.align
        );
        println!("\nConfig is valid.");
        return Ok(());
    }

    println!("\nValidation issues:");
    for error in &errors {
        println!("  - {error}");
    }
    anyhow::bail!(
        "{} issue(s) found; the analysis would fall back to the default config",
        errors.len()
    )
}
