use serde::Serialize;
use tally_core::models::{SavingsKind, SavingsTransaction};
use tally_core::{Error, SavingsGoal};

use crate::commands::common::{parse_amount, parse_date, resolve_goal, AppContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct GoalListItem {
    id: String,
    name: String,
    target_amount: f64,
    current_amount: f64,
    progress: f64,
    deadline: Option<String>,
}

pub async fn run_goal_add(
    context: &AppContext,
    name: &str,
    target: &str,
    deadline: Option<&str>,
) -> Result<(), CliError> {
    let target = parse_amount(target)?;
    let mut goal = SavingsGoal::new(name, target);
    if deadline.is_some() {
        goal.deadline = Some(parse_date(deadline)?);
    }

    let created = context.service.create_online(goal).await?;
    println!("{}", created.id);
    Ok(())
}

pub async fn run_goal_list(context: &AppContext, as_json: bool) -> Result<(), CliError> {
    let goals: Vec<SavingsGoal> = context.service.fetch_all().await?;

    if as_json {
        let items = goals
            .iter()
            .map(|goal| GoalListItem {
                id: goal.id.clone(),
                name: goal.name.clone(),
                target_amount: goal.target_amount,
                current_amount: goal.current_amount,
                progress: goal.progress(),
                deadline: goal.deadline.map(|date| date.to_string()),
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if goals.is_empty() {
        println!("No savings goals yet.");
        return Ok(());
    }

    for goal in &goals {
        let short_id: String = goal.id.chars().take(13).collect();
        let percent = goal.progress() * 100.0;
        println!(
            "{short_id:<13}  {name:<20}  {current:>10.2} / {target:>10.2}  ({percent:>5.1}%)",
            name = goal.name,
            current = goal.current_amount,
            target = goal.target_amount,
        );
    }
    Ok(())
}

pub async fn run_goal_deposit(
    context: &AppContext,
    goal_query: &str,
    amount: &str,
) -> Result<(), CliError> {
    let amount = parse_amount(amount)?;
    let goal = resolve_goal(context, goal_query).await?;
    let today = chrono::Utc::now().date_naive();

    let deposit = context
        .service
        .create_online(SavingsTransaction::new(
            goal.id.clone(),
            amount,
            SavingsKind::Deposit,
            today,
        ))
        .await?;

    // The goal total is an online edit; while offline it stays stale until
    // the next sync pulls the authoritative balance
    let patch = serde_json::json!({ "current_amount": goal.current_amount + amount });
    match context
        .service
        .update_online::<SavingsGoal>(&goal.id, patch)
        .await
    {
        Ok(_) => {}
        Err(Error::Offline(_) | Error::AuthRequired(_)) => {
            tracing::debug!("goal balance not updated offline");
        }
        Err(e) => return Err(e.into()),
    }

    println!("{}", deposit.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::common::build_context;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn deposit_records_a_savings_transaction_offline() {
        let dir = tempdir().unwrap();
        let context = build_context(dir.path(), None, None).await.unwrap();

        run_goal_add(&context, "Vacation", "1000", None).await.unwrap();
        run_goal_deposit(&context, "Vacation", "250").await.unwrap();

        let deposits: Vec<SavingsTransaction> = context.service.fetch_all().await.unwrap();
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].amount, 250.0);

        // Offline: the balance edit was rejected, not queued
        let goals: Vec<SavingsGoal> = context.service.fetch_all().await.unwrap();
        assert_eq!(goals[0].current_amount, 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deposit_into_unknown_goal_fails() {
        let dir = tempdir().unwrap();
        let context = build_context(dir.path(), None, None).await.unwrap();

        let result = run_goal_deposit(&context, "retirement", "10").await;
        assert!(matches!(result, Err(CliError::GoalNotFound(_))));
    }
}
