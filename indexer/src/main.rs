mod source;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use seekr_core::{BuilderConfig, IndexBuilder, IndexPaths, QueryEngine, SearchOptions};
use source::JsonDocumentSource;
use tracing_subscriber::{EnvFilter, fmt};

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "seekr-indexer")]
#[command(about = "Build and query a TF-IDF inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from crawled JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        data: PathBuf,
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// JSON file with indexing options; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Discard any existing index first
        #[arg(long, default_value_t = false)]
        restart: bool,
        #[command(flatten)]
        overrides: ConfigOverrides,
    },
    /// Run a single query and print the matching URLs
    Search {
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Read queries from stdin until "exit"
    Repl {
        #[arg(long, default_value = "./index")]
        index: PathBuf,
    },
    /// Print index statistics and write them next to the index
    Stats {
        #[arg(long, default_value = "./index")]
        index: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
struct ConfigOverrides {
    #[arg(long)]
    bold_weight: Option<f64>,
    #[arg(long)]
    title_weight: Option<f64>,
    #[arg(long)]
    header_weight: Option<f64>,
    /// Similarity in [0, 1] at which a page counts as a near-duplicate
    #[arg(long)]
    simhash_threshold: Option<f64>,
    /// Documents held in memory between two flushes
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long, default_value_t = false)]
    remove_stopwords: bool,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut BuilderConfig) {
        if let Some(w) = self.bold_weight { config.bold_weight = w; }
        if let Some(w) = self.title_weight { config.title_weight = w; }
        if let Some(w) = self.header_weight { config.header_weight = w; }
        if let Some(t) = self.simhash_threshold { config.simhash_threshold = t; }
        if let Some(n) = self.batch_size { config.batch_size = n; }
        if self.remove_stopwords { config.remove_stopwords = true; }
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { data, index, config, restart, overrides } => {
            build_index(&data, &index, config.as_deref(), restart, &overrides)
        }
        Commands::Search { index, limit, query } => {
            let builder = load_index(&index)?;
            run_query(&builder, &query.join(" "), limit)
        }
        Commands::Repl { index } => repl(&index),
        Commands::Stats { index } => print_stats(&index),
    }
}

fn build_index(
    data: &Path,
    index: &Path,
    config_path: Option<&Path>,
    restart: bool,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let mut config = match config_path {
        Some(p) => BuilderConfig::from_json_file(p).with_context(|| format!("reading config {}", p.display()))?,
        None => BuilderConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;

    let paths = IndexPaths::new(index);
    let mut builder = IndexBuilder::open(paths.clone(), config, restart)?;
    if builder.is_built() {
        tracing::info!(index = %index.display(), "index already built, pass --restart to rebuild");
    } else {
        let mut source = JsonDocumentSource::discover(data)?;
        let summary = builder.build(source.by_ref())?;
        tracing::info!(
            documents = summary.documents,
            duplicates = summary.duplicates,
            failed = summary.failed,
            skipped_records = source.skipped(),
            "ingested documents"
        );
    }

    let stats = builder.stats()?;
    stats.write_to(&paths.statistics())?;
    println!("{stats}");
    builder.close()?;
    Ok(())
}

fn load_index(index: &Path) -> Result<IndexBuilder> {
    IndexBuilder::load(IndexPaths::new(index))
        .with_context(|| format!("opening index {}", index.display()))
}

fn run_query(builder: &IndexBuilder, query: &str, limit: Option<usize>) -> Result<()> {
    let started = Instant::now();
    let options = SearchOptions { limit, ..Default::default() };
    let results = QueryEngine::new(builder).search_hits(query, &options)?;
    let elapsed = started.elapsed();

    println!("Found {} results.", results.total_hits);
    for hit in &results.hits {
        println!("{}", hit.url);
    }
    println!("Search took {:.2} ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

fn repl(index: &Path) -> Result<()> {
    let builder = load_index(index)?;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Enter a search query: ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let query = line?;
        let query = query.trim();
        if query.eq_ignore_ascii_case("exit") {
            break;
        }
        if query.is_empty() {
            continue;
        }
        if let Err(e) = run_query(&builder, query, Some(20)) {
            tracing::error!(error = %e, "query failed");
        }
    }
    Ok(())
}

fn print_stats(index: &Path) -> Result<()> {
    let builder = load_index(index)?;
    let stats = builder.stats()?;
    stats.write_to(&builder.paths().statistics())?;
    println!("{stats}");
    Ok(())
}
