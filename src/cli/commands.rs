use std::time::Instant;

use crate::app::{AppContext, CatalogError, Result};
use crate::cli::RunArgs;
use crate::domain::{FetchKind, Item, NewFetchLog, RunStatus};
use crate::ingest::RunRequest;
use crate::store::{BatchOutcome, SearchFilters, Store};

fn run_request(ctx: &AppContext, args: &RunArgs, kind: FetchKind) -> RunRequest {
    let mut request = ctx.run_request(kind);
    if let Some(hits) = args.hits {
        request.hits = hits;
    }
    if let Some(offset) = args.offset {
        request.offset = offset;
    }
    if let Some(total) = args.total {
        request.total = total;
    }
    if let Some(sort) = &args.sort {
        request.sort = sort.clone();
    }
    request
}

pub async fn ingest(ctx: &AppContext, args: &RunArgs, kind: FetchKind) -> Result<()> {
    let summary = ctx.ingestor.run(run_request(ctx, args, kind)).await?;

    println!("{}", summary.message());
    if let Some(total) = summary.total_result_count {
        println!("Provider reports {} matching items", total);
    }
    println!(
        "Status: {} ({} ms){}",
        summary.status,
        summary.elapsed_ms,
        if summary.log_id.is_none() {
            ", fetch log not recorded"
        } else {
            ""
        }
    );
    Ok(())
}

pub fn plan(ctx: &AppContext, args: &RunArgs) -> Result<()> {
    let request = run_request(ctx, args, FetchKind::Manual);
    let pages = request.plan()?;

    println!("{} requests planned:", pages.len());
    for (index, page) in pages.iter().enumerate() {
        println!("  {:>3}. hits={} offset={}", index + 1, page.limit, page.offset);
    }
    Ok(())
}

/// Record one single-shot fetch in the fetch log, whether it succeeded or
/// not. Rejected input never reached the provider and is not recorded.
fn record_attempt(
    ctx: &AppContext,
    kind: FetchKind,
    started: Instant,
    result: std::result::Result<BatchOutcome, &CatalogError>,
) {
    let entry = match result {
        Err(e) if e.is_rejection() => return,
        Err(e) => NewFetchLog {
            kind,
            status: RunStatus::Error,
            items_fetched: 0,
            message: e.to_string(),
            elapsed_ms: started.elapsed().as_millis() as i64,
        },
        Ok(outcome) => NewFetchLog {
            kind,
            status: RunStatus::Success,
            items_fetched: outcome.total() as i64,
            message: format!(
                "Fetched {} items ({} new, {} updated)",
                outcome.total(),
                outcome.created,
                outcome.updated
            ),
            elapsed_ms: started.elapsed().as_millis() as i64,
        },
    };

    if let Err(e) = ctx.store.append_fetch_log(&entry) {
        tracing::error!(error = %e, "Failed to record fetch log");
    }
}

pub async fn recent(ctx: &AppContext, count: i64) -> Result<()> {
    let started = Instant::now();
    let result = async {
        let page = ctx.client.fetch_recent(count).await?;
        let outcome = ctx.store.upsert_batch(&page.items)?;
        Ok::<_, CatalogError>((outcome, page.skipped))
    }
    .await;
    record_attempt(ctx, FetchKind::Manual, started, result.as_ref().map(|(o, _)| *o));

    let (outcome, skipped) = result?;
    println!("Stored {} items", outcome.total());
    if skipped > 0 {
        println!("Skipped {} items without an id", skipped);
    }
    Ok(())
}

pub async fn lookup(ctx: &AppContext, id: &str) -> Result<()> {
    let started = Instant::now();
    let result = async {
        let item = ctx
            .client
            .fetch_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::ItemNotFound(id.to_string()))?;
        let outcome = ctx.store.upsert_batch(std::slice::from_ref(&item))?;
        Ok::<_, CatalogError>((outcome, item))
    }
    .await;
    record_attempt(ctx, FetchKind::Lookup, started, result.as_ref().map(|(o, _)| *o));

    let (_, item) = result?;
    print_item(&ctx.get_by_external_id(&item.external_id)?);
    Ok(())
}

pub fn list_items(
    ctx: &AppContext,
    keyword: Option<String>,
    maker: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<()> {
    let filters = SearchFilters {
        keyword,
        maker,
        ..Default::default()
    };
    let listing = ctx.list_items(&filters, limit, offset)?;

    if listing.items.is_empty() {
        println!("No items");
        return Ok(());
    }

    for item in &listing.items {
        let date = item
            .release_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "          ".to_string());
        let price = item.display_price().unwrap_or_default();

        println!(
            "{} {:<16} {:>8}  {}",
            date,
            item.external_id,
            price,
            item.display_title()
        );
    }

    let shown_to = listing.offset + listing.items.len() as i64;
    println!(
        "Showing {}-{} of {}",
        listing.offset + 1,
        shown_to,
        listing.total
    );
    Ok(())
}

pub fn show_item(ctx: &AppContext, external_id: &str) -> Result<()> {
    print_item(&ctx.get_by_external_id(external_id)?);
    Ok(())
}

fn print_item(item: &Item) {
    println!("{}", item.display_title());
    println!("  id:       {}", item.external_id);
    if let Some(price) = item.display_price() {
        println!("  price:    {}", price);
    }
    if let Some(date) = item.release_date {
        println!("  released: {}", date);
    }
    if let Some(maker) = &item.metadata.maker {
        println!("  maker:    {}", maker);
    }
    if !item.metadata.performers.is_empty() {
        println!("  cast:     {}", item.metadata.performers.join(", "));
    }
    if !item.metadata.genres.is_empty() {
        println!("  genres:   {}", item.metadata.genres.join(", "));
    }
    if let Some(url) = item.outbound_url.as_ref().or(item.page_url.as_ref()) {
        println!("  link:     {}", url);
    }
    println!("  updated:  {}", item.updated_at.format("%Y-%m-%d %H:%M:%S"));
}

pub fn list_logs(ctx: &AppContext, limit: i64) -> Result<()> {
    let logs = ctx.store.recent_fetch_logs(limit)?;

    if logs.is_empty() {
        println!("No fetch runs recorded");
        return Ok(());
    }

    for log in logs {
        println!(
            "{} {:<9} {:<7} {:>5} items  {}",
            log.created_at.format("%Y-%m-%d %H:%M:%S"),
            log.kind,
            log.status,
            log.items_fetched,
            log.message
        );
    }
    Ok(())
}
