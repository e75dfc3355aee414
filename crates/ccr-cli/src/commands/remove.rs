use anyhow::{Context, Result};
use ccr_state::{JobStore, StateError};
use colored::Colorize;
use dialoguer::Confirm;

pub fn cmd_remove(store: &dyn JobStore, name: &str, yes: bool) -> Result<()> {
    if !store.job_exists(name).context("Failed to read job store")? {
        anyhow::bail!("Job {} not found", name);
    }

    if !yes {
        println!("{}", format!("This deletes job {} and its progress.", name).red());
        println!("Stop any running syncer first; a re-created job starts with a full sync.");

        let confirmed = Confirm::new()
            .with_prompt(format!("Remove job {}?", name))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    match store.remove_job(name) {
        Ok(()) => {}
        Err(StateError::NotFound(_)) => anyhow::bail!("Job {} not found", name),
        Err(e) => return Err(e).context("Failed to remove job"),
    }

    println!("{}", format!("Removed job {}", name).green());
    Ok(())
}
