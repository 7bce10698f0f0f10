use tally_core::models::FlowKind;
use tally_core::Transaction;

use crate::commands::common::{
    find_or_create_category, parse_amount, parse_date, resolve_description, AppContext,
};
use crate::error::CliError;

pub async fn run_add(
    context: &AppContext,
    amount: &str,
    description: &[String],
    category: &str,
    income: bool,
    date: Option<&str>,
) -> Result<(), CliError> {
    let amount = parse_amount(amount)?;
    let description = resolve_description(description)?;
    let date = parse_date(date)?;
    let kind = if income {
        FlowKind::Income
    } else {
        FlowKind::Expense
    };

    let category_id = find_or_create_category(context, category, kind).await?;
    let transaction = context
        .service
        .create_online(Transaction::new(amount, kind, category_id, description, date))
        .await?;

    println!("{}", transaction.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::common::build_context;
    use tally_core::models::is_temp_id;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn add_without_a_remote_queues_offline_creates() {
        let dir = tempdir().unwrap();
        let context = build_context(dir.path(), None, None).await.unwrap();

        run_add(&context, "12.50", &["coffee".to_string()], "Food", false, None)
            .await
            .unwrap();

        let transactions: Vec<Transaction> = context.service.fetch_all().await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert!(is_temp_id(&transactions[0].id));
        assert_eq!(transactions[0].amount, 12.5);

        // One queued create for the category, one for the transaction
        assert_eq!(context.service.sync_status().pending_operations, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_rejects_invalid_input_before_touching_the_store() {
        let dir = tempdir().unwrap();
        let context = build_context(dir.path(), None, None).await.unwrap();

        assert!(
            run_add(&context, "abc", &["x".to_string()], "Food", false, None)
                .await
                .is_err()
        );
        assert!(run_add(&context, "5", &[], "Food", false, None)
            .await
            .is_err());
        assert!(context.service.fetch_all::<Transaction>().await.unwrap().is_empty());
    }
}
