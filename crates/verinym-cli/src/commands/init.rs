//! `verinym init`: Write a default configuration file.

use clap::Args;
use std::path::Path;

use verinym_core::ScenarioConfig;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, path: &Path) -> anyhow::Result<()> {
    if path.exists() && !args.force {
        anyhow::bail!("configuration file already exists at {}", path.display());
    }
    ScenarioConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    println!("Run 'verinym genesis' to create the genesis file it points at.");
    Ok(())
}
