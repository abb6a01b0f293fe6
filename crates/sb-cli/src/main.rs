//! SiteBlock CLI
//!
//! Headless front end: edits block groups in the store file and runs the
//! enforcement loop that keeps the intercept rule in sync with them.

mod logging;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sb_core::{
    compile_with_stats, domain, BlockerConfig, FileStore, GroupStore, RequestInterceptor, WebsiteAdded,
};

#[derive(Parser)]
#[command(name = "sb-cli")]
#[command(about = "SiteBlock group editor and enforcement daemon")]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store file, overrides the configured one
    #[arg(short, long, global = true, env = "SITEBLOCK_STORE")]
    store: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List groups and their websites
    List {
        /// Print the stored JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Create a new, active group
    AddGroup { title: String },

    /// Delete a group
    RemoveGroup { title: String },

    /// Block a website in a group
    AddSite {
        group: String,
        /// Domain or URL; reduced to its base domain
        url: String,
    },

    /// Unblock a website in a group
    RemoveSite { group: String, website: String },

    /// Switch a group between active and inactive
    Toggle { group: String },

    /// Fold or unfold a group in `list` output
    Expand { group: String },

    /// Show the patterns the active groups compile to
    Patterns,

    /// Show whether a request URL would be redirected
    Check { url: String },

    /// Check whether input is a blockable website
    Validate { input: String },

    /// Enforce the groups, following changes to the store file.
    /// Request URLs read from stdin are answered against the live rule.
    Watch,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let result = load_config(&cli).and_then(|config| match cli.command {
        Commands::List { json } => cmd_list(&config, json),
        Commands::AddGroup { title } => cmd_add_group(&config, &title),
        Commands::RemoveGroup { title } => cmd_remove_group(&config, &title),
        Commands::AddSite { group, url } => cmd_add_site(&config, &group, &url),
        Commands::RemoveSite { group, website } => cmd_remove_site(&config, &group, &website),
        Commands::Toggle { group } => cmd_toggle(&config, &group),
        Commands::Expand { group } => cmd_expand(&config, &group),
        Commands::Patterns => cmd_patterns(&config),
        Commands::Check { url } => cmd_check(&config, &url),
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Watch => watch::run(&config),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<BlockerConfig, String> {
    let mut config = match &cli.config {
        Some(path) => BlockerConfig::load(path).map_err(|e| e.to_string())?,
        None => BlockerConfig::default(),
    };
    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }
    Ok(config)
}

fn open_groups(config: &BlockerConfig) -> GroupStore<FileStore> {
    GroupStore::open(FileStore::new(&config.store_path), config.storage_key.as_str())
}

fn cmd_list(config: &BlockerConfig, json: bool) -> Result<(), String> {
    let groups = open_groups(config);

    if json {
        let text = serde_json::to_string_pretty(groups.groups())
            .map_err(|e| format!("Failed to encode groups: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    if groups.groups().is_empty() {
        println!("No groups in '{}'", config.store_path.display());
        return Ok(());
    }

    for group in groups.groups() {
        let marker = if group.active { "on " } else { "off" };
        println!("[{}] {} ({} sites)", marker, group.title, group.websites.len());
        if group.expanded {
            for website in &group.websites {
                println!("      {}", website);
            }
        }
    }

    Ok(())
}

fn cmd_add_group(config: &BlockerConfig, title: &str) -> Result<(), String> {
    open_groups(config).add_group(title).map_err(|e| e.to_string())?;
    println!("Added group '{}'", title.trim());
    Ok(())
}

fn cmd_remove_group(config: &BlockerConfig, title: &str) -> Result<(), String> {
    let removed = open_groups(config).remove_group(title).map_err(|e| e.to_string())?;
    println!("Removed group '{}' ({} sites)", removed.title, removed.websites.len());
    Ok(())
}

fn cmd_add_site(config: &BlockerConfig, group: &str, url: &str) -> Result<(), String> {
    match open_groups(config).add_website(group, url).map_err(|e| e.to_string())? {
        WebsiteAdded::Added(domain) => println!("Blocking '{}' in '{}'", domain, group),
        WebsiteAdded::AlreadyPresent(domain) => println!("'{}' is already in '{}'", domain, group),
    }
    Ok(())
}

fn cmd_remove_site(config: &BlockerConfig, group: &str, website: &str) -> Result<(), String> {
    if open_groups(config).remove_website(group, website).map_err(|e| e.to_string())? {
        println!("Unblocked '{}' in '{}'", website, group);
    } else {
        println!("'{}' is not in '{}'", website, group);
    }
    Ok(())
}

fn cmd_toggle(config: &BlockerConfig, group: &str) -> Result<(), String> {
    let active = open_groups(config).toggle_active(group).map_err(|e| e.to_string())?;
    println!("'{}' is now {}", group, if active { "active" } else { "inactive" });
    Ok(())
}

fn cmd_expand(config: &BlockerConfig, group: &str) -> Result<(), String> {
    let expanded = open_groups(config).toggle_expanded(group).map_err(|e| e.to_string())?;
    println!("'{}' is now {}", group, if expanded { "expanded" } else { "collapsed" });
    Ok(())
}

fn cmd_patterns(config: &BlockerConfig) -> Result<(), String> {
    let groups = open_groups(config);
    let groups = groups.try_load().map_err(|e| e.to_string())?;
    let (patterns, stats) = compile_with_stats(&groups);

    for pattern in &patterns {
        println!("{}", pattern);
    }
    println!();
    println!("Active groups: {}", stats.active_groups);
    println!("Websites:      {}", stats.websites);
    println!("Patterns:      {} (dedupe removed {})", stats.patterns, stats.deduped);

    Ok(())
}

fn cmd_check(config: &BlockerConfig, url: &str) -> Result<(), String> {
    let groups = open_groups(config);
    let groups = groups.try_load().map_err(|e| e.to_string())?;
    let (patterns, _) = compile_with_stats(&groups);

    let interceptor = RequestInterceptor::new(config.redirect_to.as_str());
    if !patterns.is_empty() {
        interceptor.install(patterns);
    }

    println!("{}", watch::describe(&interceptor.intercept(url)));
    Ok(())
}

fn cmd_validate(input: &str) -> Result<(), String> {
    let domain = domain::canonicalize(input).map_err(|e| e.to_string())?;
    println!("Valid: would block '{}'", domain);
    Ok(())
}
