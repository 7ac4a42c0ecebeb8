//! metasearch-rs: command line front end
//!
//! Runs one query (or resumes one from a token) across every configured
//! provider and prints the merged results.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use metasearch_rs::{
    config::{self, Settings},
    locales::{parse_lang_code, parse_region_code},
    network::HttpClient,
    providers::ProviderLoader,
    Aggregator, MergeIterator, ResultIterator, SearchRequest, Token,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Metasearch: query several search engines as one
#[derive(Parser, Debug)]
#[command(
    name = "metasearch",
    version,
    about = "Query several search engines and merge their results",
    after_help = "EXAMPLES:\n    \
                  metasearch query rust async runtime       # First 10 merged results\n    \
                  metasearch q -n 25 borrow checker         # First 25 merged results\n    \
                  metasearch q --token 7b2270726f7673...    # Continue where a query stopped\n    \
                  metasearch complete solar                 # Suggestions for a prefix"
)]
struct Cli {
    /// Path to the settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search all providers and print merged results
    #[command(visible_aliases = ["q", "qu"])]
    Query {
        /// Search query
        #[arg(required_unless_present = "token")]
        query: Vec<String>,

        /// Limit the number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Resume from a token printed by an earlier query
        #[arg(long, conflicts_with_all = ["lang", "region", "safe"])]
        token: Option<String>,

        /// Result language (e.g. "en-US")
        #[arg(long)]
        lang: Option<String>,

        /// Result region (e.g. "DE")
        #[arg(long)]
        region: Option<String>,

        /// Enable safe search
        #[arg(long)]
        safe: bool,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,

        /// Print per-provider statistics to stderr when done
        #[arg(long)]
        stats: bool,
    },

    /// Print query suggestions
    #[command(visible_alias = "ac")]
    Complete {
        /// Text to complete
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// List configured providers
    Providers {
        /// Also ask each provider for its languages and regions
        #[arg(long)]
        locales: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = config::load_settings(cli.config.as_deref())?;
    init_logging(cli.verbose, &settings);
    debug!("metasearch-rs v{}", metasearch_rs::VERSION);

    let client = HttpClient::with_settings(&settings.outgoing)
        .context("failed to initialize HTTP client")?;
    let registry = ProviderLoader::load(&settings, &client)?;
    info!("Loaded {} providers", registry.len());
    let aggregator = Aggregator::new(Arc::new(registry))?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match cli.command {
        Commands::Query {
            query,
            limit,
            token,
            lang,
            region,
            safe,
            json,
            stats,
        } => {
            let limit = limit.unwrap_or(settings.search.default_limit);
            let it = match token {
                Some(hex) => {
                    let token = Token::from_hex(hex.trim())?;
                    aggregator.continue_search(&cancel, &token).await
                }
                None => {
                    let req = build_request(&settings, query.join(" "), lang, region, safe)?;
                    aggregator.search(&cancel, &req).await
                }
            };
            let outcome = print_results(&cancel, it, limit, json).await;
            if stats {
                print_stats(&aggregator);
            }
            outcome
        }
        Commands::Complete { text } => {
            let out = aggregator.auto_complete(&cancel, &text.join(" ")).await;
            for item in &out.items {
                println!("{}", item);
            }
            match out.last_error {
                Some(err) => Err(anyhow!(err).context("autocomplete incomplete")),
                None => Ok(()),
            }
        }
        Commands::Providers { locales } => {
            list_providers(&cancel, &aggregator, locales).await;
            Ok(())
        }
    }
}

fn init_logging(verbose: bool, settings: &Settings) {
    let level = if verbose || settings.general.debug {
        "debug"
    } else {
        "warn"
    };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if settings.outgoing.debug_http {
        if let Ok(directive) = "metasearch_rs::network=trace".parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, canceling search");
            cancel.cancel();
        }
    });
}

/// Request from command line flags, falling back to configured defaults
fn build_request(
    settings: &Settings,
    query: String,
    lang: Option<String>,
    region: Option<String>,
    safe: bool,
) -> Result<SearchRequest> {
    let mut req = SearchRequest::new(query);
    if let Some(lang) = lang.or_else(|| settings.search.default_lang.clone()) {
        req = req.with_lang(parse_lang_code(&lang)?);
    }
    if let Some(region) = region.or_else(|| settings.search.default_region.clone()) {
        req = req.with_region(parse_region_code(&region)?);
    }
    if safe {
        req = req.with_safe_search(true);
    } else if let Some(enabled) = settings.search.safe_search {
        req = req.with_safe_search(enabled);
    }
    Ok(req)
}

async fn print_results(
    cancel: &CancellationToken,
    mut it: MergeIterator,
    limit: usize,
    json: bool,
) -> Result<()> {
    let mut printed = 0;
    while printed < limit && it.next(cancel).await {
        let Some(result) = it.result() else {
            continue;
        };
        if json {
            println!("{}", serde_json::to_string(result)?);
        } else {
            println!("{} - {:?} ({})\n", result.url(), result.title(), result.kind());
        }
        printed += 1;
    }
    if let Some(err) = it.err() {
        let err = anyhow!(err.clone());
        close(&mut it);
        return Err(err);
    }

    let token = it.token();
    close(&mut it);
    match token {
        Ok(Some(token)) => println!("\ntoken: {}", token.to_hex()),
        Ok(None) => debug!("Results exhausted, no token"),
        Err(err) => return Err(anyhow!(err).context("cannot capture resume token")),
    }
    Ok(())
}

fn close(it: &mut MergeIterator) {
    if let Err(err) = it.close() {
        warn!("closing search failed: {}", err);
    }
}

fn print_stats(aggregator: &Aggregator) {
    let metrics = aggregator.metrics();
    eprintln!("searches: {}", metrics.get_total_searches());
    for (id, s) in metrics.snapshot() {
        eprintln!(
            "{:<12} searches={} results={} errors={} exhausted={} reliability={:.0}%",
            id,
            s.searches,
            s.results,
            s.errors,
            s.exhausted,
            s.reliability()
        );
    }
}

async fn list_providers(cancel: &CancellationToken, aggregator: &Aggregator, locales: bool) {
    for provider in aggregator.registry().iter() {
        let about = provider.about();
        let autocomplete = if provider.as_autocomplete().is_some() {
            "yes"
        } else {
            "no"
        };
        println!(
            "{:<12} {:<30} format={} official_api={} autocomplete={}",
            provider.id(),
            about.website.as_deref().unwrap_or("-"),
            about.results,
            about.use_official_api,
            autocomplete
        );
        if !locales {
            continue;
        }
        match provider.languages(cancel).await {
            Ok(langs) => println!("{:<12} languages: {}", "", langs.len()),
            Err(err) => println!("{:<12} languages: error: {}", "", err),
        }
        match provider.regions(cancel).await {
            Ok(regions) => println!("{:<12} regions: {}", "", regions.len()),
            Err(err) => println!("{:<12} regions: error: {}", "", err),
        }
    }
}
