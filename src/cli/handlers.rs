// src/cli/handlers.rs
use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

use password_details::utils::{format_time_ago, truncate_string};
use password_details::{NewPasswordRecord, Page, PageRequest, PasswordRecord, PasswordStore, RecordFilter, RecordUpdate};

use super::commands::{CliCommand, FilterArgs};

impl From<FilterArgs> for RecordFilter {
    fn from(args: FilterArgs) -> Self {
        RecordFilter {
            password_category: args.category,
            project_name_contains: args.project,
        }
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid record ID: {}", id))
}

// Handlers for CLI commands
pub async fn handle_command(store: &PasswordStore, command: CliCommand, json: bool) -> Result<()> {
    match command {
        CliCommand::Add { category, project, details } => {
            let record = store
                .create(NewPasswordRecord::new(&category, &project, &details))
                .await?;
            output(&record, json, || {
                println!("✅ Added record {}", record.id);
                print_record(&record);
            })
        }

        CliCommand::List { page, limit, filter, newest } => {
            let limit = limit.unwrap_or_else(|| store.default_page_size());
            let mut request = PageRequest::new(page, limit);
            if newest {
                request = request.newest_first();
            }

            let result = store.paginate(&filter.into(), request).await?;
            output(&result, json, || print_page(&result))
        }

        CliCommand::Get { id } => {
            let record = store.get(parse_id(&id)?).await?;
            output(&record, json, || print_record(&record))
        }

        CliCommand::Update { id, category, project, details } => {
            let update = RecordUpdate {
                password_category: category,
                project_name: project,
                password_details: details,
            };
            let record = store.update(parse_id(&id)?, update).await?;
            output(&record, json, || {
                println!("✅ Updated record {}", record.id);
                print_record(&record);
            })
        }

        CliCommand::Delete { id } => {
            let id = parse_id(&id)?;
            store.delete(id).await?;
            output(&serde_json::json!({ "deleted": id }), json, || {
                println!("🗑️  Deleted record {}", id);
            })
        }

        CliCommand::Count { filter } => {
            let count = store.count(&filter.into()).await?;
            output(&serde_json::json!({ "count": count }), json, || {
                println!("{} record(s)", count);
            })
        }
    }
}

fn output<T: Serialize>(value: &T, json: bool, text: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text();
    }
    Ok(())
}

fn print_record(record: &PasswordRecord) {
    println!("ID:       {}", record.id);
    println!("Category: {}", record.password_category);
    println!("Project:  {}", record.project_name);
    println!("Details:  {}", record.password_details);
    println!("Date:     {} ({})", record.date.to_rfc3339(), format_time_ago(record.date));
}

fn print_page(page: &Page<PasswordRecord>) {
    if page.docs.is_empty() {
        println!("No records on page {}.", page.page);
    } else {
        println!("{:<36}  {:<16}  {:<24}  {}", "ID", "CATEGORY", "PROJECT", "ADDED");
        for record in &page.docs {
            println!(
                "{:<36}  {:<16}  {:<24}  {}",
                record.id,
                truncate_string(&record.password_category, 16),
                truncate_string(&record.project_name, 24),
                format_time_ago(record.date),
            );
        }
    }

    println!(
        "Page {} of {} ({} record(s) total)",
        page.page,
        page.total_pages.max(1),
        page.total_docs
    );
}
