#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use creditdb_core::config::Config;
use creditdb_core::types::SearchResult;
use creditdb_hybrid::{expand, initialize, Catalog, FusionMethod, SearchOptions};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "creditdb: hybrid retrieval over the LEED credit knowledge base",
    long_about = None
)]
struct Cli {
    /// Directory holding config.toml (defaults to the current directory).
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the knowledge base.
    Query(QueryArgs),
    /// Show the sub-queries a question expands into.
    Expand {
        text: String,
        #[arg(long, default_value_t = 6)]
        max: usize,
    },
    /// List loaded sources.
    Sources,
    /// List credits in the default source.
    Credits,
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    text: String,
    /// Number of results.
    #[arg(short, long, default_value_t = 5)]
    k: usize,
    /// Source to search; repeat for several.
    #[arg(long = "source")]
    sources: Vec<String>,
    #[arg(long)]
    fusion: Option<FusionMethod>,
    /// Dense retrieval only.
    #[arg(long)]
    no_hybrid: bool,
    #[arg(long)]
    no_expansion: bool,
    #[arg(long)]
    no_grouping: bool,
}

impl QueryArgs {
    fn options(&self, defaults: &SearchOptions) -> SearchOptions {
        let mut opts = defaults.clone();
        if !self.sources.is_empty() {
            opts.sources = Some(self.sources.clone());
        }
        if let Some(fusion) = self.fusion {
            opts.fusion_method = fusion;
        }
        if self.no_hybrid {
            opts.use_hybrid = false;
        }
        if self.no_expansion {
            opts.use_query_expansion = false;
        }
        if self.no_grouping {
            opts.use_grouping = false;
        }
        opts
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("creditdb=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn load_catalog(cli: &Cli) -> anyhow::Result<Catalog> {
    let config = match &cli.config_dir {
        Some(dir) => Config::load_from(dir)?,
        None => Config::load()?,
    };
    let engine = config.engine()?;
    let defaults: SearchOptions = config.get_or_default("engine.search")?;
    debug!(sources = engine.sources.len(), "loaded configuration");
    Ok(initialize(&engine)?.with_search_defaults(defaults))
}

fn print_results(query: &str, results: &[SearchResult]) {
    println!("🔍 {} result(s) for \"{}\"", results.len(), query);
    for r in results {
        let meta = &r.metadata.chunk;
        println!(
            "\n#{} [{:.4}] {} · {} · {} ({})",
            r.rank,
            r.score,
            meta.credit_id.as_deref().unwrap_or("unknown"),
            meta.section,
            r.metadata.index,
            r.metadata.method,
        );
        let preview: String = r.text.chars().take(240).collect();
        let truncated = r.text.chars().count() > 240;
        println!("   {}{}", preview, if truncated { "…" } else { "" });
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match &cli.command {
        Commands::Expand { text, max } => {
            let subqueries = expand(text, *max);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&subqueries)?);
            } else {
                for (i, q) in subqueries.iter().enumerate() {
                    println!("{}. {}", i + 1, q);
                }
            }
        }
        Commands::Query(args) => {
            let catalog = load_catalog(&cli)?;
            let opts = args.options(catalog.search_defaults());
            let results = catalog.search(&args.text, args.k, &opts);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&args.text, &results);
            }
        }
        Commands::Sources => {
            let catalog = load_catalog(&cli)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&catalog.sources())?);
            } else {
                for s in catalog.sources() {
                    let marker = if s.name == catalog.default_source() {
                        " (default)"
                    } else {
                        ""
                    };
                    let lexical = if s.lexical { "yes" } else { "no" };
                    println!(
                        "📚 {}{}: {} chunks, lexical: {}",
                        s.name, marker, s.chunks, lexical
                    );
                }
            }
        }
        Commands::Credits => {
            let catalog = load_catalog(&cli)?;
            let credits = catalog.credits();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&credits)?);
            } else {
                for c in &credits {
                    println!(
                        "{:<6} {:<12} {} ({} chunks)",
                        c.credit_code.as_deref().unwrap_or("-"),
                        c.credit_id.as_deref().unwrap_or("-"),
                        c.credit_name.as_deref().unwrap_or(""),
                        c.chunks,
                    );
                }
                println!("✅ {} credits", credits.len());
            }
        }
    }
    Ok(())
}
