use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::config::load_job;

pub fn cmd_check(job_path: &Path) -> Result<()> {
    let def = load_job(job_path)?;

    println!("{} {}", "✓".green(), format!("{} is valid", def.name).green());
    println!("  type: {}", def.sync_type);
    println!("  src:  {}", def.src);
    println!("  dest: {}", def.dest);
    Ok(())
}
