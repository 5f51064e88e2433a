use questlog_core::LocalStore;

use crate::commands::common::applied;
use crate::error::CliError;

pub async fn run_delete(id: &str, store: &LocalStore) -> Result<(), CliError> {
    let task_id = store.resolve_task_id(id).await?;
    let deleted = applied(store.delete_task(&task_id).await?)?;
    println!("{deleted}");
    Ok(())
}
