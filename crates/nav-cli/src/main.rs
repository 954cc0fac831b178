use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use nav_catalog::search::{
    advanced_search, global_search, suggest, AdvancedOptions, SortOrder, DEFAULT_SUGGESTION_LIMIT,
};
use serde::Serialize;
use serde_json::json;

const CLI_NAME: &str = "nav-cli";

#[derive(Parser)]
#[command(name = "nav", version, about = "Notion-backed link directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve,
    /// Print the current directory snapshot.
    Snapshot {
        #[arg(long)]
        pretty: bool,
    },
    /// Search link names, descriptions and tags.
    Search(SearchArgs),
    /// Suggest link names for a partial query.
    Suggest {
        query: String,
        #[arg(long, default_value_t = DEFAULT_SUGGESTION_LIMIT)]
        limit: usize,
    },
    /// Check Notion credentials and database access.
    Check,
}

#[derive(Args)]
struct SearchArgs {
    query: String,
    /// Enable `#tag` tokens, category filter and sorting.
    #[arg(long)]
    advanced: bool,
    #[arg(long, requires = "advanced")]
    category: Option<String>,
    #[arg(long, requires = "advanced")]
    sort_name: bool,
    #[arg(long)]
    pretty: bool,
}

impl SearchArgs {
    fn options(&self) -> AdvancedOptions {
        AdvancedOptions {
            category_id: self.category.clone(),
            sort: if self.sort_name {
                SortOrder::Name
            } else {
                SortOrder::Source
            },
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Serve = cli.command {
        let config = nav_api::load_config()?;
        return nav_api::run(config).await;
    }

    nav_core::logging::init(CLI_NAME);
    let (cache, notion) = nav_api::build_catalog(&nav_api::load_catalog_config())?;

    match cli.command {
        Commands::Serve => {}
        Commands::Snapshot { pretty } => {
            let snapshot = cache.get().await;
            tracing::info!(
                origin = snapshot.origin.as_str(),
                links = snapshot.links.len(),
                "snapshot ready"
            );
            print_json(
                &json!({
                    "categories": snapshot.categories,
                    "linksByCategory": snapshot.links_by_category(),
                    "fetchedAt": snapshot.fetched_at,
                    "origin": snapshot.origin,
                }),
                pretty,
            )?;
        }
        Commands::Search(args) => {
            let snapshot = cache.get().await;
            let results = if args.advanced {
                let options = args.options();
                advanced_search(
                    Some(args.query.as_str()),
                    &snapshot.categories,
                    &snapshot.links,
                    &options,
                )
            } else {
                global_search(Some(args.query.as_str()), &snapshot.categories, &snapshot.links)
            };
            print_json(&results, args.pretty)?;
        }
        Commands::Suggest { query, limit } => {
            let snapshot = cache.get().await;
            print_json(&suggest(&query, &snapshot.links, limit), false)?;
        }
        Commands::Check => {
            notion.check_connection().await.map_err(|err| {
                anyhow!("notion connection failed ({}): {err}", err.kind())
            })?;
            let info = notion
                .database_info()
                .await
                .map_err(|err| anyhow!("notion database check failed ({}): {err}", err.kind()))?;
            print_json(
                &json!({
                    "status": "ok",
                    "database_id": info.id,
                    "title": info.title,
                    "properties": info.property_names,
                }),
                true,
            )?;
        }
    }

    Ok(())
}
