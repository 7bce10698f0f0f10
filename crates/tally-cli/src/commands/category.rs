use serde::Serialize;
use tally_core::models::FlowKind;
use tally_core::Category;

use crate::commands::common::AppContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct CategoryListItem {
    id: String,
    name: String,
    kind: FlowKind,
}

pub async fn run_category_add(
    context: &AppContext,
    name: &str,
    income: bool,
) -> Result<(), CliError> {
    let kind = if income {
        FlowKind::Income
    } else {
        FlowKind::Expense
    };

    let category = context
        .service
        .create_online(Category::new(name, kind))
        .await?;
    println!("{}", category.id);
    Ok(())
}

pub async fn run_category_list(context: &AppContext, as_json: bool) -> Result<(), CliError> {
    let categories: Vec<Category> = context.service.fetch_all().await?;

    if as_json {
        let items = categories
            .iter()
            .map(|category| CategoryListItem {
                id: category.id.clone(),
                name: category.name.clone(),
                kind: category.kind,
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if categories.is_empty() {
        println!("No categories yet.");
        return Ok(());
    }

    for category in &categories {
        let kind = match category.kind {
            FlowKind::Income => "income",
            FlowKind::Expense => "expense",
        };
        let short_id: String = category.id.chars().take(13).collect();
        println!("{short_id:<13}  {kind:<8}  {}", category.name);
    }
    Ok(())
}
