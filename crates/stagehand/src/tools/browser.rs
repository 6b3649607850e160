//! Browser catalog tools.

use std::sync::Arc;

use livewire::envelope::ToolOutput;
use livewire::error::BridgeError;
use serde::Deserialize;
use serde_json::json;

use crate::state::App;

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    pub limit: Option<usize>,
}

pub async fn search(app: &Arc<App>, args: SearchArgs) -> Result<ToolOutput, BridgeError> {
    let limit = args.limit.unwrap_or(25);
    let items = app.catalog.search(&args.query, limit);
    Ok(ToolOutput::with_data(
        format!("{} match(es) for '{}'", items.len(), args.query),
        json!({ "items": items, "catalog": app.catalog.status() }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListCategoryArgs {
    pub category: String,
    pub limit: Option<usize>,
}

pub async fn list_category(
    app: &Arc<App>,
    args: ListCategoryArgs,
) -> Result<ToolOutput, BridgeError> {
    let limit = args.limit.unwrap_or(50);
    let items = app.catalog.list_category(&args.category, limit);
    Ok(ToolOutput::with_data(
        format!("{} item(s) in '{}'", items.len(), args.category),
        json!({ "items": items, "known_categories": app.catalog.categories() }),
    ))
}

pub async fn refresh(app: &Arc<App>) -> Result<ToolOutput, BridgeError> {
    let count = app.catalog.populate(&app.pipeline).await?;
    if count == 0 && app.catalog.is_populated() {
        return Ok(ToolOutput::message(
            "a populate is already running; keeping the current catalog",
        ));
    }
    Ok(ToolOutput::with_data(
        format!("catalog refreshed: {} items", count),
        app.catalog.status(),
    ))
}
