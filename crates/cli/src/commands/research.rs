//! `delve research`: Browse stored research.

use clap::Subcommand;
use delve_config::AppConfig;
use delve_core::research::{ResearchStore, ResearchSummary};
use delve_store::SqliteStore;

#[derive(Subcommand)]
pub enum ResearchAction {
    /// List the most recent research
    List {
        /// How many records to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one research record as JSON
    Show {
        /// Research id
        id: i64,
    },
}

pub async fn run(config: AppConfig, action: ResearchAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::open(&config.store.path).await?;

    match action {
        ResearchAction::List { limit } => {
            let limit = limit.unwrap_or(config.store.list_limit);
            let rows = store.list_research(limit, 0).await?;
            if rows.is_empty() {
                println!("No research yet.");
            }
            for row in &rows {
                println!("{}", summary_line(row));
            }
        }
        ResearchAction::Show { id } => match store.get_full_research(id).await? {
            Some(research) => println!("{}", serde_json::to_string_pretty(&research)?),
            None => {
                store.close().await;
                return Err(format!("Research {id} not found").into());
            }
        },
    }

    store.close().await;
    Ok(())
}

fn summary_line(row: &ResearchSummary) -> String {
    let mut line = format!(
        "{:>5}  {}  {}",
        row.research_id,
        row.created_at.format("%Y-%m-%d %H:%M"),
        row.title
    );
    if !row.keywords.is_empty() {
        line.push_str(&format!("  [{}]", row.keywords.join(", ")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn summary_line_format() {
        let at = chrono::Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        let row = ResearchSummary {
            research_id: 7,
            title: "Eiffel Tower".into(),
            thumbnail: None,
            keywords: vec!["Paris".into(), "iron".into()],
            created_at: at,
            updated_at: at,
        };
        assert_eq!(
            summary_line(&row),
            "    7  2025-06-01 09:30  Eiffel Tower  [Paris, iron]"
        );
    }
}
