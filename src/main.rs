use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use linkward::checker::CheckOutcome;
use linkward::config::load_config;
use linkward::{Config, PageChecker, SqliteStorage, Storage};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linkward")]
#[command(about = "A polite, incremental site link-checker", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all log output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a site and seed its frontier
    Init {
        /// Unique site name
        name: String,
        /// Seed URL, e.g. https://example.com/
        url: String,
    },
    /// Check the next page(s) of a site
    Check {
        name: String,
        /// How many pages to check this run
        #[arg(short, long, default_value_t = 1)]
        num: usize,
        /// Seconds to wait between checks (defaults to the config value)
        #[arg(long)]
        delay: Option<u64>,
    },
    /// Delete all pages of a site and re-seed it
    Reset { name: String },
    /// List registered sites
    List,
    /// Show a site's progress and recent problems
    Show { name: String },
    /// Count how many pages carry each distinct value of a named fact
    Values {
        name: String,
        /// Value name, e.g. "version"
        value_name: String,
    },
    /// Recheck a page at a fixed interval
    Schedule {
        name: String,
        /// Page path relative to the site, e.g. /docs/
        path: String,
        /// Rotation interval in seconds
        #[arg(long)]
        every: i64,
    },
    /// Remove a page's recheck interval
    Unschedule {
        name: String,
        path: String,
    },
    /// Delete a single page (rejected while other pages still link to it)
    DeletePage {
        name: String,
        path: String,
    },
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }
    let default_level = match verbose {
        0 => "linkward=info",
        1 => "linkward=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn outcome_line(outcome: &CheckOutcome) -> String {
    match outcome {
        CheckOutcome::Processed {
            url,
            status,
            links_added,
            links_removed,
            plugin_failures,
        } => {
            let mut line = format!(
                "OK      {} [{}] +{} -{} links",
                url, status, links_added, links_removed
            );
            for failure in plugin_failures {
                line.push_str(&format!("\n        plugin {}", failure));
            }
            line
        }
        CheckOutcome::NotHtml { url, content_type } => {
            format!("SKIP    {} ({})", url, content_type)
        }
        CheckOutcome::OffSite {
            url,
            final_url,
            links_dropped,
        } => format!(
            "OFFSITE {} -> {} (-{} links)",
            url, final_url, links_dropped
        ),
        CheckOutcome::ValidationFailed {
            url,
            status,
            message,
        } => format!("FAIL    {} [{}] {}", url, status, message),
        CheckOutcome::UnexpectedContent { url, message } => {
            format!("ODD     {} {}", url, message)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => load_config(path).context("Failed to load configuration")?,
        None => Config::default(),
    };

    let storage = SqliteStorage::new(&config.storage.database_path)
        .with_context(|| format!("Failed to open database {}", config.storage.database_path))?;
    let mut checker = PageChecker::new(storage, &config)?;

    match cli.command {
        Commands::Init { name, url } => {
            let site = checker.init_site(&name, &url)?;
            println!("Initialized '{}' at {}", site.name, site.seed_url());
        }

        Commands::Check { name, num, delay } => {
            let site = checker.site_by_name(&name)?;
            let delay = Duration::from_secs(delay.unwrap_or(config.checker.delay_secs));

            let mut problems = 0;
            for i in 0..num {
                if i > 0 {
                    tokio::time::sleep(delay).await;
                }
                match checker.check_next(&site).await? {
                    Some(outcome) => {
                        if !outcome.is_success() {
                            problems += 1;
                        }
                        println!("{}", outcome_line(&outcome));
                    }
                    None => {
                        println!("Site '{}' has no pages to check", name);
                        break;
                    }
                }
            }

            let (checked, total, percent) = checker.progress(&site)?;
            println!("Progress: {}/{} pages checked ({:.1}%)", checked, total, percent);
            if problems > 0 {
                println!("{} check(s) reported problems", problems);
            }
        }

        Commands::Reset { name } => {
            let site = checker.reset_site(&name)?;
            println!("Reset '{}'; frontier re-seeded at {}", site.name, site.seed_url());
        }

        Commands::List => {
            let sites = checker.storage().list_sites()?;
            if sites.is_empty() {
                println!("No sites registered");
            }
            for site in sites {
                let (checked, total, percent) = checker.progress(&site)?;
                println!(
                    "{:<20} {} ({}/{} checked, {:.1}%)",
                    site.name,
                    site.seed_url(),
                    checked,
                    total,
                    percent
                );
            }
        }

        Commands::Show { name } => {
            let site = checker.site_by_name(&name)?;
            let (checked, total, percent) = checker.progress(&site)?;
            let links = checker.storage().count_links(site.id)?;

            println!("Site:     {}", site.name);
            println!("URL:      {}", site.seed_url());
            println!("Pages:    {} ({} checked, {:.1}%)", total, checked, percent);
            println!("Links:    {}", links);

            let errors = checker.storage().error_pages(site.id)?;
            if !errors.is_empty() {
                println!("Problems:");
                for page in errors.iter().take(20) {
                    println!(
                        "  [{}] {} {}",
                        page.status,
                        page.relative_url(),
                        page.error_message
                    );
                }
            }

            let scheduled = checker.storage().scheduled_pages(site.id)?;
            if !scheduled.is_empty() {
                println!("Scheduled:");
                for entry in scheduled {
                    let page = checker.storage().get_page(entry.page_id)?;
                    println!(
                        "  {} every {}s (next due {})",
                        page.relative_url(),
                        entry.rotation_secs,
                        entry.watermark().to_rfc3339()
                    );
                }
            }
        }

        Commands::Values { name, value_name } => {
            let site = checker.site_by_name(&name)?;
            let counts = checker.storage().count_values(site.id, &value_name)?;
            if counts.is_empty() {
                println!("No '{}' values recorded for site '{}'", value_name, name);
            }
            for (value, pages) in counts {
                println!("{:<30} {} pages", value, pages);
            }
        }

        Commands::Schedule { name, path, every } => {
            if every <= 0 {
                bail!("Rotation interval must be positive");
            }
            let site = checker.site_by_name(&name)?;
            let page = checker
                .page_by_relative_url(&site, &path)?
                .with_context(|| format!("No page at {} for site '{}'", path, name))?;
            checker.schedule_page(page.id, every)?;
            println!("Scheduled {} every {}s", page.relative_url(), every);
        }

        Commands::Unschedule { name, path } => {
            let site = checker.site_by_name(&name)?;
            let page = checker
                .page_by_relative_url(&site, &path)?
                .with_context(|| format!("No page at {} for site '{}'", path, name))?;
            checker.unschedule_page(page.id)?;
            println!("Unscheduled {}", page.relative_url());
        }

        Commands::DeletePage { name, path } => {
            let site = checker.site_by_name(&name)?;
            let page = checker
                .page_by_relative_url(&site, &path)?
                .with_context(|| format!("No page at {} for site '{}'", path, name))?;
            checker.delete_page(page.id)?;
            println!("Deleted {}", page.relative_url());
        }
    }

    Ok(())
}
