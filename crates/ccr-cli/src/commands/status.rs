use anyhow::{Context, Result};
use ccr_core::{JobDefinition, JobProgress, SyncPhase};
use ccr_state::JobStore;

/// One line of the status table.
#[derive(Debug, PartialEq, Eq)]
struct StatusRow {
    name: String,
    sync_type: String,
    phase: String,
    commit_seq: String,
    txn: String,
}

pub fn cmd_status(store: &dyn JobStore) -> Result<()> {
    let rows = status_rows(store)?;

    if rows.is_empty() {
        println!("No jobs found. Run 'ccr-syncer create <job.toml>' to add one.");
        return Ok(());
    }

    println!("\nJobs:");
    println!(
        "{:<24} {:<6} {:<12} {:>12} {:>10}",
        "Job", "Type", "Phase", "Commit Seq", "Open Txn"
    );
    println!("{:-<68}", "");

    for row in rows {
        println!(
            "{:<24} {:<6} {:<12} {:>12} {:>10}",
            row.name, row.sync_type, row.phase, row.commit_seq, row.txn
        );
    }

    println!();
    Ok(())
}

fn status_rows(store: &dyn JobStore) -> Result<Vec<StatusRow>> {
    let jobs = store.list_jobs().context("Failed to list jobs")?;
    let mut rows = Vec::with_capacity(jobs.len());

    for (name, data) in jobs {
        let def = JobDefinition::from_json(&data)
            .with_context(|| format!("Corrupt definition for job {}", name))?;
        let progress = match store
            .get_progress(&name)
            .with_context(|| format!("Failed to read progress of job {}", name))?
        {
            Some(data) => Some(
                JobProgress::from_json(&data)
                    .with_context(|| format!("Corrupt progress for job {}", name))?,
            ),
            None => None,
        };

        let (phase, commit_seq, txn) = match progress {
            None => ("pending".to_string(), "-".to_string(), "-".to_string()),
            Some(p) => (
                phase_name(p.phase).to_string(),
                if p.phase == SyncPhase::Incremental {
                    p.commit_seq.to_string()
                } else {
                    "-".to_string()
                },
                p.transaction
                    .map(|t| t.txn_id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        };

        rows.push(StatusRow {
            name,
            sync_type: def.sync_type.to_string(),
            phase,
            commit_seq,
            txn,
        });
    }

    Ok(rows)
}

fn phase_name(phase: SyncPhase) -> &'static str {
    match phase {
        SyncPhase::FirstSync => "first sync",
        SyncPhase::FullSync => "full sync",
        SyncPhase::Incremental => "incremental",
    }
}
