//! Rule state machine and change reactor
//!
//! The enforcement side keeps the interceptor consistent with the persisted
//! groups. On start and on every change notification for the groups key it
//! rereads the groups, recompiles, and moves between two states:
//!
//! ```text
//!   Uninstalled --non-empty--> Installed(set)
//!   Installed(a) --non-empty b != a--> Installed(b)
//!   Installed(_) --empty--> Uninstalled
//! ```
//!
//! Recompiling to the same set is a no-op. If the groups cannot be read, the
//! last installed set stays in force.

use std::sync::mpsc::Receiver;

use log::{debug, info, warn};

use crate::compiler::compile_with_stats;
use crate::group::Group;
use crate::groups::{read_groups, GroupStore};
use crate::interceptor::RequestInterceptor;
use crate::pattern::PatternSet;
use crate::store::{ChangeEvent, KeyValueStore, StoreError};

/// Current enforcement state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RuleState {
    #[default]
    Uninstalled,
    Installed(PatternSet),
}

impl RuleState {
    pub fn patterns(&self) -> Option<&PatternSet> {
        match self {
            Self::Uninstalled => None,
            Self::Installed(set) => Some(set),
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed(_))
    }
}

/// What one event did to the installed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Uninstalled -> Installed
    Installed { rule_id: u32, patterns: usize },
    /// Installed -> Installed with a different set
    Replaced { rule_id: u32, patterns: usize },
    /// Installed -> Uninstalled
    Uninstalled,
    /// Compiled set equals the current state
    Unchanged,
    /// Groups could not be read; previous rule kept
    Retained,
    /// Event was not about the groups key
    Ignored,
}

/// Read access to the persisted group collection.
pub trait GroupSource {
    /// Store key the groups live under.
    fn key(&self) -> &str;

    /// Strictly read the groups.
    fn read_groups(&self) -> Result<Vec<Group>, StoreError>;
}

impl<S: KeyValueStore> GroupSource for GroupStore<S> {
    fn key(&self) -> &str {
        GroupStore::key(self)
    }

    fn read_groups(&self) -> Result<Vec<Group>, StoreError> {
        self.try_load()
    }
}

/// Read-only view of the groups in a store, for the enforcement side.
#[derive(Debug, Clone)]
pub struct StoreSource<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> StoreSource<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }
}

impl<S: KeyValueStore> GroupSource for StoreSource<S> {
    fn key(&self) -> &str {
        &self.key
    }

    fn read_groups(&self) -> Result<Vec<Group>, StoreError> {
        read_groups(&self.store, &self.key)
    }
}

/// Two-state machine owning the interceptor's installed rule.
#[derive(Debug)]
pub struct RuleStateMachine {
    state: RuleState,
    interceptor: RequestInterceptor,
}

impl RuleStateMachine {
    /// Start uninstalled. Any rule left in the interceptor is removed so the
    /// state and the slot agree.
    pub fn new(interceptor: RequestInterceptor) -> Self {
        interceptor.uninstall();
        Self {
            state: RuleState::Uninstalled,
            interceptor,
        }
    }

    pub fn state(&self) -> &RuleState {
        &self.state
    }

    pub fn interceptor(&self) -> &RequestInterceptor {
        &self.interceptor
    }

    /// Recompile from `groups` and install, replace or uninstall as needed.
    pub fn apply(&mut self, groups: &[Group]) -> Transition {
        let (patterns, stats) = compile_with_stats(groups);
        debug!(
            "Compiled {} pattern(s) from {} active group(s), {} duplicate(s) dropped",
            stats.patterns, stats.active_groups, stats.deduped
        );

        if patterns.is_empty() {
            if !self.state.is_installed() {
                return Transition::Unchanged;
            }
            self.interceptor.uninstall();
            self.state = RuleState::Uninstalled;
            info!("No active blocks; intercept rule uninstalled");
            return Transition::Uninstalled;
        }

        if self.state.patterns() == Some(&patterns) {
            debug!("Pattern set unchanged; keeping installed rule");
            return Transition::Unchanged;
        }

        let count = patterns.len();
        let was_installed = self.state.is_installed();
        // One swap: requests never see the slot empty between rules
        let rule_id = self.interceptor.install(patterns.clone());
        self.state = RuleState::Installed(patterns);

        if was_installed {
            info!("Replaced intercept rule: {} pattern(s), rule {}", count, rule_id);
            Transition::Replaced { rule_id, patterns: count }
        } else {
            info!("Installed intercept rule: {} pattern(s), rule {}", count, rule_id);
            Transition::Installed { rule_id, patterns: count }
        }
    }

    /// Read the groups from `source` and apply them.
    ///
    /// A read failure keeps whatever is installed.
    pub fn refresh<G: GroupSource + ?Sized>(&mut self, source: &G) -> Transition {
        match source.read_groups() {
            Ok(groups) => self.apply(&groups),
            Err(e) => {
                warn!("Keeping current intercept rule, groups unreadable: {}", e);
                Transition::Retained
            }
        }
    }
}

/// Input to the [`ChangeReactor`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReactorEvent {
    /// The enforcement process started
    Started,
    /// A store key changed
    Changed(ChangeEvent),
}

/// Drives a [`RuleStateMachine`] from start and change events.
pub struct ChangeReactor<G> {
    machine: RuleStateMachine,
    source: G,
}

impl<G: GroupSource> ChangeReactor<G> {
    pub fn new(machine: RuleStateMachine, source: G) -> Self {
        Self { machine, source }
    }

    pub fn machine(&self) -> &RuleStateMachine {
        &self.machine
    }

    pub fn source(&self) -> &G {
        &self.source
    }

    /// Handle one event to completion.
    ///
    /// The groups key disappearing from a store that held it is treated like
    /// an unreadable store: the current rule stays installed until groups
    /// are written again.
    pub fn handle(&mut self, event: &ReactorEvent) -> Transition {
        match event {
            ReactorEvent::Started => self.machine.refresh(&self.source),
            ReactorEvent::Changed(change)
                if change.key == self.source.key() && change.old_value.is_some() && change.new_value.is_none() =>
            {
                warn!("Groups under '{}' were removed; keeping current intercept rule", change.key);
                Transition::Retained
            }
            ReactorEvent::Changed(change) if change.key == self.source.key() && change.is_change() => {
                self.machine.refresh(&self.source)
            }
            ReactorEvent::Changed(change) => {
                debug!("Ignoring change to '{}'", change.key);
                Transition::Ignored
            }
        }
    }

    /// Handle events one at a time until every sender is gone.
    /// Returns the number of events handled.
    pub fn run(&mut self, events: Receiver<ReactorEvent>) -> usize {
        let mut handled = 0;
        for event in events {
            self.handle(&event);
            handled += 1;
        }
        handled
    }
}
