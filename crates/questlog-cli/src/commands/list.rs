use questlog_core::{LocalStore, TaskStatus};

use crate::commands::common::{
    format_task_lines, parse_day, task_to_list_item, today, TaskListItem,
};
use crate::error::CliError;

pub async fn run_list(
    due: Option<&str>,
    status: Option<TaskStatus>,
    limit: usize,
    as_json: bool,
    store: &LocalStore,
) -> Result<(), CliError> {
    let mut tasks = match due {
        Some(raw) => {
            let day = parse_day(raw, today())?;
            store.list_tasks_for_day(day, status).await?
        }
        None => store.list_tasks(limit, 0).await?,
    };
    tasks.truncate(limit);

    if as_json {
        let json_items = tasks
            .iter()
            .map(task_to_list_item)
            .collect::<Vec<TaskListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if tasks.is_empty() {
        println!("No tasks.");
    } else {
        for line in format_task_lines(&tasks) {
            println!("{line}");
        }
    }

    Ok(())
}
