//! Block rule compiler
//!
//! Turns the group collection into the pattern set the interceptor installs.
//! Only active groups contribute; duplicates across groups collapse.

use crate::group::Group;
use crate::pattern::PatternSet;

/// Counters from one compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub active_groups: usize,
    pub websites: usize,
    pub emitted: usize,
    pub deduped: usize,
    pub patterns: usize,
}

/// Compile active groups into their pattern set.
pub fn compile(groups: &[Group]) -> PatternSet {
    compile_with_stats(groups).0
}

/// Compile and report how many patterns were emitted and collapsed.
pub fn compile_with_stats(groups: &[Group]) -> (PatternSet, CompileStats) {
    let mut set = PatternSet::new();
    let mut stats = CompileStats::default();

    for group in groups.iter().filter(|g| g.active) {
        stats.active_groups += 1;
        for website in &group.websites {
            stats.websites += 1;
            stats.emitted += 2;
            stats.deduped += 2 - set.insert_domain(website);
        }
    }

    stats.patterns = set.len();
    (set, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    fn group(title: &str, active: bool, websites: &[&str]) -> Group {
        Group {
            title: title.to_string(),
            websites: websites.iter().map(|w| w.to_string()).collect(),
            active,
            expanded: false,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(compile(&[]).is_empty());
    }

    #[test]
    fn test_inactive_groups_contribute_nothing() {
        let groups = [group("Off", false, &["x.com"])];
        assert!(compile(&groups).is_empty());
    }

    #[test]
    fn test_active_group_emits_both_forms() {
        let groups = [group("On", true, &["x.com"])];
        let set = compile(&groups);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Pattern::Exact("x.com".to_string())));
        assert!(set.contains(&Pattern::Subdomains("x.com".to_string())));
    }

    #[test]
    fn test_dedupes_across_groups() {
        let groups = [
            group("A", true, &["x.com", "y.com"]),
            group("B", true, &["y.com"]),
            group("C", false, &["z.com"]),
        ];
        let (set, stats) = compile_with_stats(&groups);
        assert_eq!(set.len(), 4);
        assert_eq!(
            stats,
            CompileStats {
                active_groups: 2,
                websites: 3,
                emitted: 6,
                deduped: 2,
                patterns: 4,
            }
        );
    }

    #[test]
    fn test_order_independent() {
        let a = [group("A", true, &["x.com"]), group("B", true, &["y.com"])];
        let b = [group("B", true, &["y.com"]), group("A", true, &["x.com"])];
        assert_eq!(compile(&a), compile(&b));
    }
}
