use questlog_core::LocalStore;

use crate::commands::common::{applied, parse_day, resolve_title, today};
use crate::error::CliError;

pub async fn run_done(id: &str, store: &LocalStore) -> Result<(), CliError> {
    let task_id = store.resolve_task_id(id).await?;
    let task = applied(store.complete_task(&task_id).await?)?;
    println!("Done: {}", task.title);
    Ok(())
}

pub async fn run_reopen(id: &str, store: &LocalStore) -> Result<(), CliError> {
    let task_id = store.resolve_task_id(id).await?;
    let task = applied(store.reopen_task(&task_id).await?)?;
    println!("Reopened: {}", task.title);
    Ok(())
}

pub async fn run_rename(
    id: &str,
    title_parts: &[String],
    store: &LocalStore,
) -> Result<(), CliError> {
    let title = resolve_title(title_parts)?;
    let task_id = store.resolve_task_id(id).await?;
    let task = applied(store.rename_task(&task_id, &title).await?)?;
    println!("{}", task.id);
    Ok(())
}

pub async fn run_reschedule(id: &str, day: &str, store: &LocalStore) -> Result<(), CliError> {
    let due_date = parse_day(day, today())?;
    let task_id = store.resolve_task_id(id).await?;
    let task = applied(store.reschedule_task(&task_id, due_date).await?)?;
    println!("{} due {}", task.id, task.due_date);
    Ok(())
}
