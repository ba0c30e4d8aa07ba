//! `reptracker init` command - create the tracker database

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use crate::cli::helpers::{open_store, success};
use crate::cli::GlobalOpts;
use crate::core::config::LOCAL_CONFIG_FILE;
use crate::core::mapping::Table;
use crate::core::Config;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Also write a reptracker.yaml template in the current directory
    #[arg(long)]
    pub config: bool,

    /// Overwrite an existing reptracker.yaml
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts, config: &Config) -> Result<()> {
    if args.config {
        write_config_template(Path::new(LOCAL_CONFIG_FILE), config, args.force, global)?;
    }

    let store = open_store(config)?;
    let location = store
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ":memory:".to_string());
    success(
        global,
        format!("Initialized tracker database at {}", style(location).cyan()),
    );

    if !global.quiet {
        println!();
        println!("Next steps:");
        println!(
            "  {} Record a received unit",
            style("reptracker order --coldhead <SERIAL>").yellow()
        );
        println!(
            "  {} Find it again",
            style("reptracker search <SERIAL>").yellow()
        );
    }
    Ok(())
}

fn write_config_template(path: &Path, config: &Config, force: bool, global: &GlobalOpts) -> Result<()> {
    if path.exists() && !force {
        println!(
            "{} {} already exists (use --force to overwrite)",
            style("!").yellow(),
            path.display()
        );
        return Ok(());
    }

    let mut contents = String::new();
    contents.push_str("# reptracker configuration\n");
    contents.push_str(&format!("database: {}\n", config.database().display()));
    contents.push_str("# log_level: info\n");
    contents.push_str("# busy_timeout_ms: 5000\n");
    contents.push_str("#\n# Column overrides when the live schema uses different names:\n");
    contents.push_str("# mappings:\n");
    for table in Table::ALL {
        contents.push_str(&format!("#   {}:\n", table));
        if let Some(column) = table.logical_columns().get(1) {
            contents.push_str(&format!("#     {}: {}\n", column, column));
        }
    }

    std::fs::write(path, contents).into_diagnostic()?;
    success(global, format!("Wrote {}", style(path.display()).cyan()));
    Ok(())
}
