//! Mutation results and the seam for game rules.
//!
//! Balance formulas (experience curves, streak multipliers, idle earnings)
//! live outside this crate. Callers compute amounts and hand the repository a
//! pure rule `FnOnce(&PlayerProgress) -> RuleResult<PlayerProgress>`; the
//! helpers below only enforce the invariants every rule shares.

use thiserror::Error;

use crate::models::PlayerProgress;

/// Why a domain operation refused to change state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("task is already done")]
    AlreadyDone,
    #[error("task is not done")]
    NotDone,
    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: i64, available: i64 },
    #[error("already owned: {0}")]
    AlreadyOwned(String),
    #[error("already claimed: {0}")]
    AlreadyClaimed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type RuleResult<T> = std::result::Result<T, Rejection>;

/// Outcome of a repository write.
///
/// `Rejected` means nothing was written and nothing was queued.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Mutation<T> {
    Applied(T),
    Rejected(Rejection),
}

impl<T> Mutation<T> {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Applied(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

impl<T> From<RuleResult<T>> for Mutation<T> {
    fn from(result: RuleResult<T>) -> Self {
        match result {
            Ok(value) => Self::Applied(value),
            Err(rejection) => Self::Rejected(rejection),
        }
    }
}

fn require_non_negative(amount: i64, field: &str) -> RuleResult<()> {
    if amount < 0 {
        return Err(Rejection::InvalidInput(format!(
            "{field} must not be negative"
        )));
    }
    Ok(())
}

fn debit(progress: &mut PlayerProgress, amount: i64) -> RuleResult<()> {
    if progress.currency < amount {
        return Err(Rejection::InsufficientBalance {
            required: amount,
            available: progress.currency,
        });
    }
    progress.currency -= amount;
    Ok(())
}

/// Grant currency and experience
pub fn award(
    currency: i64,
    experience: i64,
) -> impl FnOnce(&PlayerProgress) -> RuleResult<PlayerProgress> {
    move |old| {
        require_non_negative(currency, "currency")?;
        require_non_negative(experience, "experience")?;
        let mut next = old.clone();
        next.currency = next.currency.saturating_add(currency);
        next.experience = next.experience.saturating_add(experience);
        Ok(next)
    }
}

/// Spend currency, rejecting overdrafts
pub fn spend(amount: i64) -> impl FnOnce(&PlayerProgress) -> RuleResult<PlayerProgress> {
    move |old| {
        require_non_negative(amount, "amount")?;
        let mut next = old.clone();
        debit(&mut next, amount)?;
        Ok(next)
    }
}

/// Buy an item once
pub fn unlock(
    item: impl Into<String>,
    cost: i64,
) -> impl FnOnce(&PlayerProgress) -> RuleResult<PlayerProgress> {
    let item = item.into();
    move |old| {
        require_non_negative(cost, "cost")?;
        if item.trim().is_empty() {
            return Err(Rejection::InvalidInput("item must not be empty".to_string()));
        }
        if old.unlocked_items.contains(&item) {
            return Err(Rejection::AlreadyOwned(item));
        }
        let mut next = old.clone();
        debit(&mut next, cost)?;
        next.unlocked_items.insert(item);
        Ok(next)
    }
}

/// Claim a one-time reward
pub fn claim_reward(
    reward: impl Into<String>,
    currency: i64,
) -> impl FnOnce(&PlayerProgress) -> RuleResult<PlayerProgress> {
    let reward = reward.into();
    move |old| {
        require_non_negative(currency, "currency")?;
        if reward.trim().is_empty() {
            return Err(Rejection::InvalidInput(
                "reward must not be empty".to_string(),
            ));
        }
        if old.claimed_rewards.contains(&reward) {
            return Err(Rejection::AlreadyClaimed(reward));
        }
        let mut next = old.clone();
        next.currency = next.currency.saturating_add(currency);
        next.claimed_rewards.insert(reward);
        Ok(next)
    }
}

/// Bank idle earnings computed elsewhere and move the collection mark
pub fn collect_idle(
    amount: i64,
    collected_at: i64,
) -> impl FnOnce(&PlayerProgress) -> RuleResult<PlayerProgress> {
    move |old| {
        require_non_negative(amount, "amount")?;
        if old
            .idle_collected_at
            .is_some_and(|previous| collected_at <= previous)
        {
            return Err(Rejection::InvalidInput(
                "idle earnings already collected for this period".to_string(),
            ));
        }
        let mut next = old.clone();
        next.currency = next.currency.saturating_add(amount);
        next.idle_collected_at = Some(collected_at);
        Ok(next)
    }
}
