use std::collections::HashMap;

use serde::Serialize;
use tally_core::models::{is_temp_id, FlowKind};
use tally_core::{Category, Transaction};

use crate::commands::common::AppContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct TransactionListItem {
    id: String,
    date: String,
    amount: f64,
    kind: FlowKind,
    category: String,
    description: String,
    pending: bool,
}

pub async fn run_list(context: &AppContext, limit: usize, as_json: bool) -> Result<(), CliError> {
    let transactions: Vec<Transaction> = context.service.fetch_all().await?;
    let categories: Vec<Category> = context.service.fetch_all().await?;
    let category_names: HashMap<String, String> = categories
        .into_iter()
        .map(|category| (category.id, category.name))
        .collect();

    let transactions: Vec<&Transaction> = transactions.iter().take(limit).collect();

    if as_json {
        let items = transactions
            .iter()
            .map(|tx| transaction_to_item(tx, &category_names))
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions recorded.");
        return Ok(());
    }

    for line in format_transaction_lines(&transactions, &category_names) {
        println!("{line}");
    }
    Ok(())
}

fn transaction_to_item(
    transaction: &Transaction,
    category_names: &HashMap<String, String>,
) -> TransactionListItem {
    TransactionListItem {
        id: transaction.id.clone(),
        date: transaction.date.to_string(),
        amount: transaction.amount,
        kind: transaction.kind,
        category: category_name(category_names, &transaction.category_id),
        description: transaction.description.clone(),
        pending: is_temp_id(&transaction.id),
    }
}

fn category_name(category_names: &HashMap<String, String>, category_id: &str) -> String {
    category_names
        .get(category_id)
        .cloned()
        .unwrap_or_else(|| "(unknown)".to_string())
}

fn format_transaction_lines(
    transactions: &[&Transaction],
    category_names: &HashMap<String, String>,
) -> Vec<String> {
    transactions
        .iter()
        .map(|transaction| {
            let short_id: String = transaction.id.chars().take(13).collect();
            let amount = format_amount(transaction);
            let category = category_name(category_names, &transaction.category_id);
            let marker = if is_temp_id(&transaction.id) { "*" } else { " " };

            format!(
                "{short_id:<13}{marker} {date}  {amount:>10}  {category:<16}  {description}",
                date = transaction.date,
                description = transaction.description,
            )
        })
        .collect()
}

fn format_amount(transaction: &Transaction) -> String {
    match transaction.kind {
        FlowKind::Income => format!("+{:.2}", transaction.amount),
        FlowKind::Expense => format!("-{:.2}", transaction.amount),
    }
}
