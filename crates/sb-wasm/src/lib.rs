//! WebAssembly bindings for SiteBlock
//!
//! The extension's options page drives a [`GroupEditor`] and writes its
//! [`GroupEditor::snapshot`] to browser storage; the background page feeds
//! every stored value back into a [`RuleEngine`] and asks it about requests.

use wasm_bindgen::prelude::*;

use sb_core::{
    compile_with_stats, domain, Group, GroupStore, InterceptResult, KeyValueStore, MemoryStore,
    RequestInterceptor, RuleStateMachine, Transition, GROUPS_KEY,
};

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            log::Level::Info => web_sys::console::info_1(&line),
            log::Level::Debug | log::Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Route `sb-core` log output to the browser console.
/// `level` is one of error/warn/info/debug/trace, defaulting to warn.
#[wasm_bindgen]
pub fn init_logging(level: Option<String>) -> Result<(), JsValue> {
    let level = parse_level(level.as_deref()).ok_or_else(|| JsValue::from_str("Unknown log level"))?;
    log::set_logger(&LOGGER).map_err(|_| JsValue::from_str("Logging is already initialized"))?;
    log::set_max_level(level);
    Ok(())
}

fn parse_level(level: Option<&str>) -> Option<log::LevelFilter> {
    match level.map(str::to_ascii_lowercase).as_deref() {
        None | Some("warn") => Some(log::LevelFilter::Warn),
        Some("error") => Some(log::LevelFilter::Error),
        Some("info") => Some(log::LevelFilter::Info),
        Some("debug") => Some(log::LevelFilter::Debug),
        Some("trace") => Some(log::LevelFilter::Trace),
        Some("off") => Some(log::LevelFilter::Off),
        Some(_) => None,
    }
}

#[wasm_bindgen]
pub fn validate_url(raw: &str) -> bool {
    domain::validate(raw)
}

/// Base domain for `raw`, or `undefined` when it is not a blockable website.
#[wasm_bindgen]
pub fn normalize_url(raw: &str) -> Option<String> {
    domain::canonicalize(raw).ok()
}

fn parse_groups(groups_json: &str) -> Result<Vec<Group>, String> {
    serde_json::from_str(groups_json).map_err(|e| format!("Invalid groups JSON: {}", e))
}

fn set(target: &js_sys::Object, key: &str, value: &JsValue) {
    let _ = js_sys::Reflect::set(target, &key.into(), value);
}

fn string_array<I: IntoIterator<Item = String>>(items: I) -> js_sys::Array {
    let array = js_sys::Array::new();
    for item in items {
        array.push(&JsValue::from_str(&item));
    }
    array
}

/// Compile a stored group collection into match pattern strings.
#[wasm_bindgen]
pub fn compile_patterns(groups_json: &str) -> Result<JsValue, JsValue> {
    let groups = parse_groups(groups_json).map_err(|e| JsValue::from_str(&e))?;
    let (patterns, stats) = compile_with_stats(&groups);

    let result = js_sys::Object::new();
    set(&result, "patterns", &string_array(patterns.to_strings()));
    set(&result, "activeGroups", &JsValue::from(stats.active_groups as u32));
    set(&result, "websites", &JsValue::from(stats.websites as u32));
    set(&result, "deduped", &JsValue::from(stats.deduped as u32));
    Ok(result.into())
}

/// Mutation API over an in-memory copy of the group collection.
#[wasm_bindgen]
pub struct GroupEditor {
    groups: GroupStore<MemoryStore>,
}

#[wasm_bindgen]
impl GroupEditor {
    /// Start from a stored collection, or from nothing.
    #[wasm_bindgen(constructor)]
    pub fn new(groups_json: Option<String>) -> Result<GroupEditor, JsValue> {
        let mut store = MemoryStore::new();
        if let Some(json) = groups_json {
            let value = serde_json::from_str(&json)
                .map_err(|e| JsValue::from_str(&format!("Invalid groups JSON: {}", e)))?;
            store
                .set(GROUPS_KEY, value)
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
        }
        let groups = GroupStore::open(store, GROUPS_KEY);
        Ok(GroupEditor { groups })
    }

    pub fn add_group(&mut self, title: &str) -> Result<(), JsValue> {
        self.groups.add_group(title).map_err(to_js)
    }

    pub fn remove_group(&mut self, title: &str) -> Result<(), JsValue> {
        self.groups.remove_group(title).map(|_| ()).map_err(to_js)
    }

    /// Returns the stored base domain.
    pub fn add_website(&mut self, title: &str, raw_url: &str) -> Result<String, JsValue> {
        self.groups
            .add_website(title, raw_url)
            .map(|added| added.domain().to_string())
            .map_err(to_js)
    }

    pub fn remove_website(&mut self, title: &str, website: &str) -> Result<bool, JsValue> {
        self.groups.remove_website(title, website).map_err(to_js)
    }

    pub fn toggle_active(&mut self, title: &str) -> Result<bool, JsValue> {
        self.groups.toggle_active(title).map_err(to_js)
    }

    pub fn toggle_expanded(&mut self, title: &str) -> Result<bool, JsValue> {
        self.groups.toggle_expanded(title).map_err(to_js)
    }

    /// Group titles in insertion order.
    pub fn titles(&self) -> Vec<String> {
        self.groups.groups().iter().map(|g| g.title.clone()).collect()
    }

    /// The collection as the JSON value to put in browser storage.
    pub fn snapshot(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.groups.groups()).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

fn to_js(err: sb_core::GroupError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn transition_kind(transition: &Transition) -> &'static str {
    match transition {
        Transition::Installed { .. } => "installed",
        Transition::Replaced { .. } => "replaced",
        Transition::Uninstalled => "uninstalled",
        Transition::Unchanged => "unchanged",
        Transition::Retained => "retained",
        Transition::Ignored => "ignored",
    }
}

/// Enforcement side: keeps the redirect rule in step with stored groups.
#[wasm_bindgen]
pub struct RuleEngine {
    machine: RuleStateMachine,
}

#[wasm_bindgen]
impl RuleEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(redirect_to: &str) -> RuleEngine {
        RuleEngine {
            machine: RuleStateMachine::new(RequestInterceptor::new(redirect_to)),
        }
    }

    /// Apply the stored groups at startup. Same contract as
    /// [`RuleEngine::on_groups_changed`].
    pub fn start(&mut self, groups_json: Option<String>) -> JsValue {
        self.on_groups_changed(groups_json)
    }

    /// Recompile after the stored groups changed. A missing value means no
    /// groups; a value that does not parse keeps the current rule.
    pub fn on_groups_changed(&mut self, groups_json: Option<String>) -> JsValue {
        let transition = self.refresh(groups_json.as_deref());

        let result = js_sys::Object::new();
        set(&result, "kind", &JsValue::from_str(transition_kind(&transition)));
        if let Transition::Installed { rule_id, patterns } | Transition::Replaced { rule_id, patterns } = transition {
            set(&result, "ruleId", &JsValue::from(rule_id));
            set(&result, "patterns", &JsValue::from(patterns as u32));
        }
        result.into()
    }

    /// Decide one request: `{ redirect, redirectUrl?, ruleId?, pattern? }`.
    pub fn intercept(&self, url: &str) -> JsValue {
        let result = js_sys::Object::new();
        match self.machine.interceptor().intercept(url) {
            InterceptResult::Allow => set(&result, "redirect", &JsValue::from(false)),
            InterceptResult::Redirect { to, rule_id, pattern } => {
                set(&result, "redirect", &JsValue::from(true));
                set(&result, "redirectUrl", &JsValue::from_str(&to));
                set(&result, "ruleId", &JsValue::from(rule_id));
                set(&result, "pattern", &JsValue::from_str(&pattern.to_string()));
            }
        }
        result.into()
    }

    pub fn should_redirect(&self, url: &str) -> bool {
        self.machine.interceptor().should_redirect(url)
    }

    pub fn installed_patterns(&self) -> Vec<String> {
        self.machine
            .state()
            .patterns()
            .map(|set| set.to_strings())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> JsValue {
        let stats = self.machine.interceptor().stats();
        let result = js_sys::Object::new();
        set(&result, "totalRequests", &JsValue::from(stats.total_requests as f64));
        set(&result, "redirectedRequests", &JsValue::from(stats.redirected_requests as f64));
        result.into()
    }
}

impl RuleEngine {
    fn refresh(&mut self, groups_json: Option<&str>) -> Transition {
        let groups = match groups_json {
            None => Vec::new(),
            Some(json) => match parse_groups(json) {
                Ok(groups) => groups,
                Err(e) => {
                    log::warn!("Keeping current rule: {}", e);
                    return Transition::Retained;
                }
            },
        };
        self.machine.apply(&groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(None), Some(log::LevelFilter::Warn));
        assert_eq!(parse_level(Some("DEBUG")), Some(log::LevelFilter::Debug));
        assert_eq!(parse_level(Some("loud")), None);
    }

    #[test]
    fn test_editor_snapshot_feeds_engine() {
        let mut editor = GroupEditor::new(None).unwrap();
        editor.add_group("Focus").unwrap();
        assert_eq!(editor.add_website("Focus", "https://www.reddit.com/r/rust").unwrap(), "reddit.com");

        let snapshot = editor.snapshot().unwrap();
        let mut engine = RuleEngine::new("/blocked.html");
        assert!(matches!(engine.refresh(Some(snapshot.as_str())), Transition::Installed { patterns: 2, .. }));
        assert!(engine.should_redirect("https://old.reddit.com/"));
        assert_eq!(engine.installed_patterns(), vec!["*://reddit.com/*", "*://*.reddit.com/*"]);

        editor.toggle_active("Focus").unwrap();
        let snapshot = editor.snapshot().unwrap();
        assert_eq!(engine.refresh(Some(snapshot.as_str())), Transition::Uninstalled);
        assert!(!engine.should_redirect("https://reddit.com/"));
    }

    #[test]
    fn test_editor_reopens_stored_json() {
        let stored = r#"[{"title":"Work","websites":["slack.com"],"active":true,"expanded":false}]"#;
        let mut editor = GroupEditor::new(Some(stored.to_string())).unwrap();
        assert_eq!(editor.titles(), vec!["Work"]);
        assert!(editor.remove_website("Work", "slack.com").unwrap());
        assert!(!editor.remove_website("Work", "slack.com").unwrap());
    }

    #[test]
    fn test_unparseable_groups_keep_rule() {
        let mut engine = RuleEngine::new("/blocked.html");
        let groups = r#"[{"title":"A","websites":["x.com"],"active":true,"expanded":true}]"#;
        assert!(matches!(engine.refresh(Some(groups)), Transition::Installed { .. }));
        assert_eq!(engine.refresh(Some("{oops")), Transition::Retained);
        assert!(engine.should_redirect("https://x.com/"));
        assert_eq!(engine.refresh(None), Transition::Uninstalled);
    }

    #[test]
    fn test_transition_kind() {
        assert_eq!(transition_kind(&Transition::Unchanged), "unchanged");
        assert_eq!(transition_kind(&Transition::Replaced { rule_id: 2, patterns: 4 }), "replaced");
    }
}
