mod check;
mod create;
mod remove;
mod show;
mod status;

pub use check::cmd_check;
pub use create::cmd_create;
pub use remove::cmd_remove;
pub use show::cmd_show;
pub use status::cmd_status;
