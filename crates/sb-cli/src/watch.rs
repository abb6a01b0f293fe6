//! Enforcement loop
//!
//! Polls the store file, feeds changes to the reactor one at a time and
//! answers request URLs arriving on stdin against the installed rule.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use sb_core::{
    BlockerConfig, ChangeReactor, FileStore, InterceptResult, ReactorEvent, RequestInterceptor, RuleStateMachine,
    StoreSource, StoreWatcher, Transition,
};

pub fn run(config: &BlockerConfig) -> Result<(), String> {
    config.validate().map_err(|e| e.to_string())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(run_async(config))
}

async fn run_async(config: &BlockerConfig) -> Result<(), String> {
    let store = FileStore::new(&config.store_path);
    let mut watcher = StoreWatcher::new(store.clone());
    let machine = RuleStateMachine::new(RequestInterceptor::new(config.redirect_to.as_str()));
    let mut reactor = ChangeReactor::new(machine, StoreSource::new(store, config.storage_key.as_str()));

    info!(
        store = %config.store_path.display(),
        interval_ms = config.poll_interval_ms,
        "Enforcing block groups"
    );
    report(&reactor.handle(&ReactorEvent::Started));

    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut requests = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
            _ = ticker.tick() => {
                match watcher.poll() {
                    Ok(changes) => {
                        for change in changes {
                            report(&reactor.handle(&ReactorEvent::Changed(change)));
                        }
                    }
                    Err(e) => warn!("Store unreadable, keeping current rule: {}", e),
                }
            }
            line = requests.next_line(), if stdin_open => match line {
                Ok(Some(url)) => {
                    let url = url.trim();
                    if !url.is_empty() {
                        let result = reactor.machine().interceptor().intercept(url);
                        println!("{} {}", url, describe(&result));
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Stopped reading requests from stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    let stats = reactor.machine().interceptor().stats();
    info!(
        requests = stats.total_requests,
        redirected = stats.redirected_requests,
        "Enforcement stopped"
    );
    Ok(())
}

/// One-line rendering of an interception decision.
pub fn describe(result: &InterceptResult) -> String {
    match result {
        InterceptResult::Redirect { to, pattern, .. } => format!("REDIRECT -> {} (matched {})", to, pattern),
        InterceptResult::Allow => "ALLOW".to_string(),
    }
}

fn report(transition: &Transition) {
    match transition {
        Transition::Installed { rule_id, patterns } => {
            println!("Installed rule {} with {} patterns", rule_id, patterns)
        }
        Transition::Replaced { rule_id, patterns } => {
            println!("Replaced rule, now rule {} with {} patterns", rule_id, patterns)
        }
        Transition::Uninstalled => println!("No active groups, rule uninstalled"),
        Transition::Retained => println!("Store unreadable, keeping current rule"),
        Transition::Unchanged | Transition::Ignored => {}
    }
}
