use anyhow::{Context, Result};
use ccr_core::{JobDefinition, JobProgress};
use ccr_state::JobStore;
use serde_json::json;

const MASK: &str = "********";

pub fn cmd_show(store: &dyn JobStore, name: &str) -> Result<()> {
    let report = job_report(store, name)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Definition (passwords masked) and progress of one job.
fn job_report(store: &dyn JobStore, name: &str) -> Result<serde_json::Value> {
    let data = store
        .get_job(name)
        .context("Failed to read job")?
        .with_context(|| format!("Job {} not found", name))?;

    let mut def = JobDefinition::from_json(&data).context("Corrupt job definition")?;
    for spec in [&mut def.src, &mut def.dest] {
        if !spec.password.is_empty() {
            spec.password = MASK.to_string();
        }
    }

    let progress = match store.get_progress(name).context("Failed to read progress")? {
        Some(data) => Some(JobProgress::from_json(&data).context("Corrupt progress record")?),
        None => None,
    };

    Ok(json!({
        "job": def,
        "progress": progress,
    }))
}
