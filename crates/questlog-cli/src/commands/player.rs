use questlog_core::{LocalStore, Player};
use serde::Serialize;

use crate::commands::common::{applied, format_timestamp};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct PlayerItem<'a> {
    pub currency: i64,
    pub experience: i64,
    pub unlocked_items: Vec<&'a str>,
    pub claimed_rewards: Vec<&'a str>,
    pub updated_at: i64,
    pub sync_status: &'static str,
}

pub fn player_to_item(player: &Player) -> PlayerItem<'_> {
    PlayerItem {
        currency: player.progress.currency,
        experience: player.progress.experience,
        unlocked_items: player.progress.unlocked_items.iter().map(String::as_str).collect(),
        claimed_rewards: player
            .progress
            .claimed_rewards
            .iter()
            .map(String::as_str)
            .collect(),
        updated_at: player.updated_at,
        sync_status: player.sync_status.as_str(),
    }
}

pub fn format_player_lines(player: &Player) -> Vec<String> {
    let progress = &player.progress;
    let mut lines = vec![
        format!("Currency:   {}", progress.currency),
        format!("Experience: {}", progress.experience),
    ];
    if !progress.unlocked_items.is_empty() {
        let items = progress
            .unlocked_items
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();
        lines.push(format!("Items:      {}", items.join(", ")));
    }
    if !progress.claimed_rewards.is_empty() {
        let rewards = progress
            .claimed_rewards
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();
        lines.push(format!("Rewards:    {}", rewards.join(", ")));
    }
    if player.updated_at > 0 {
        lines.push(format!(
            "Updated:    {} ({})",
            format_timestamp(player.updated_at),
            player.sync_status.as_str()
        ));
    }
    lines
}

pub async fn run_player(as_json: bool, store: &LocalStore) -> Result<(), CliError> {
    let player = store.get_player().await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&player_to_item(&player))?);
    } else {
        for line in format_player_lines(&player) {
            println!("{line}");
        }
    }
    Ok(())
}

fn print_balance(player: &Player) {
    println!(
        "Currency: {}  Experience: {}",
        player.progress.currency, player.progress.experience
    );
}

pub async fn run_award(currency: i64, experience: i64, store: &LocalStore) -> Result<(), CliError> {
    let player = applied(store.award(currency, experience).await?)?;
    print_balance(&player);
    Ok(())
}

pub async fn run_spend(amount: i64, store: &LocalStore) -> Result<(), CliError> {
    let player = applied(store.spend_currency(amount).await?)?;
    print_balance(&player);
    Ok(())
}

pub async fn run_unlock(item: &str, cost: i64, store: &LocalStore) -> Result<(), CliError> {
    let player = applied(store.unlock_item(item, cost).await?)?;
    println!("Unlocked {item}");
    print_balance(&player);
    Ok(())
}

pub async fn run_claim(reward: &str, currency: i64, store: &LocalStore) -> Result<(), CliError> {
    let player = applied(store.claim_reward(reward, currency).await?)?;
    println!("Claimed {reward}");
    print_balance(&player);
    Ok(())
}
