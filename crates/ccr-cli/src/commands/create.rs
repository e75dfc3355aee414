use std::path::Path;

use anyhow::{Context, Result};
use ccr_core::JobDefinition;
use ccr_state::{JobStore, StateError};
use colored::Colorize;
use tracing::info;

use crate::config::load_job;

pub fn cmd_create(store: &dyn JobStore, job_path: &Path) -> Result<()> {
    let def = load_job(job_path)?;
    register(store, &def)?;

    println!("{}", format!("Created job {} ({} sync)", def.name, def.sync_type).green());
    println!("It starts with a full sync the next time the syncer runs.");
    Ok(())
}

fn register(store: &dyn JobStore, def: &JobDefinition) -> Result<()> {
    let data = def.to_json().context("Failed to serialize job")?;

    match store.add_job(&def.name, &data) {
        Ok(()) => {
            info!(job = %def.name, sync_type = %def.sync_type, "Registered job");
            Ok(())
        }
        Err(StateError::AlreadyExists(name)) => anyhow::bail!("Job {} already exists", name),
        Err(e) => Err(e).context("Failed to register job"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccr_core::Spec;
    use ccr_state::SqliteJobStore;

    fn definition(name: &str) -> JobDefinition {
        let spec = Spec {
            host: "fe".into(),
            port: 9030,
            thrift_port: 9020,
            user: "root".into(),
            password: "pw".into(),
            database: "sales".into(),
            table: "orders".into(),
            ..Default::default()
        };
        JobDefinition::new(name, spec.clone(), spec).unwrap()
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let store = SqliteJobStore::in_memory().unwrap();

        register(&store, &definition("t1")).unwrap();
        let err = register(&store, &definition("t1")).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let stored = store.get_job("t1").unwrap().unwrap();
        assert_eq!(JobDefinition::from_json(&stored).unwrap(), definition("t1"));
    }
}
