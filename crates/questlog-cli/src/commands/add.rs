use questlog_core::LocalStore;

use crate::commands::common::{applied, parse_day, resolve_title, today};
use crate::error::CliError;

pub async fn run_add(
    title_parts: &[String],
    due: Option<&str>,
    store: &LocalStore,
) -> Result<(), CliError> {
    let title = resolve_title(title_parts)?;
    let due_date = match due {
        Some(raw) => parse_day(raw, today())?,
        None => today(),
    };

    let task = applied(store.create_task(&title, due_date).await?)?;
    println!("{}", task.id);
    Ok(())
}
