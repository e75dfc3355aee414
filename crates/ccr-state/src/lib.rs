mod error;
mod sqlite;

pub use error::{StateError, StateResult};
pub use sqlite::SqliteJobStore;

/// Durable storage for job definitions and progress records.
///
/// Both are opaque JSON blobs owned by the engine. Every write replaces the
/// whole value.
pub trait JobStore: Send + Sync {
    /// Check whether a job with this name is registered.
    fn job_exists(&self, name: &str) -> StateResult<bool>;

    /// Register a new job. Fails with [`StateError::AlreadyExists`] on a name collision.
    fn add_job(&self, name: &str, job_info: &str) -> StateResult<()>;

    /// Overwrite an existing job definition.
    fn update_job(&self, name: &str, job_info: &str) -> StateResult<()>;

    /// Get a job definition.
    fn get_job(&self, name: &str) -> StateResult<Option<String>>;

    /// All registered jobs as (name, definition) pairs, ordered by name.
    fn list_jobs(&self) -> StateResult<Vec<(String, String)>>;

    /// Remove a job and its progress.
    fn remove_job(&self, name: &str) -> StateResult<()>;

    /// Check whether a progress record exists for the job.
    fn progress_exists(&self, name: &str) -> StateResult<bool>;

    /// Get the progress record for the job.
    fn get_progress(&self, name: &str) -> StateResult<Option<String>>;

    /// Insert or overwrite the progress record for the job.
    fn update_progress(&self, name: &str, progress: &str) -> StateResult<()>;
}
