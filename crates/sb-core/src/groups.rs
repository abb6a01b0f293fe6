//! Group collection and mutation API
//!
//! [`GroupStore`] owns the ordered in-memory collection of groups and mirrors
//! it into a [`KeyValueStore`] under a single key. Every mutation works on a
//! copy, persists the full copy and only then commits it, so the in-memory
//! collection never holds a state that was not saved.

use log::{debug, info, warn};
use serde_json::Value;

use crate::domain::canonicalize;
use crate::group::Group;
use crate::store::{KeyValueStore, StoreError};

/// Error type for group mutations.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("Group title must not be empty")]
    EmptyTitle,
    #[error("A group named '{0}' already exists")]
    DuplicateGroup(String),
    #[error("No group named '{0}'")]
    GroupNotFound(String),
    #[error("'{0}' is not a valid website")]
    InvalidUrl(String),
    #[error("'{website}' is already in group '{title}'")]
    DuplicateWebsite { title: String, website: String },
    #[error("Could not persist groups: {0}")]
    StorageUnavailable(#[from] StoreError),
}

/// Outcome of [`GroupStore::add_website`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebsiteAdded {
    /// The canonical domain was appended
    Added(String),
    /// The canonical domain was already in the group; nothing changed
    AlreadyPresent(String),
}

impl WebsiteAdded {
    pub fn domain(&self) -> &str {
        match self {
            Self::Added(d) | Self::AlreadyPresent(d) => d,
        }
    }
}

/// Decode the persisted value, `None` meaning "absent".
fn decode_groups(key: &str, value: Option<Value>) -> Result<Vec<Group>, StoreError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value).map_err(|source| StoreError::Corrupted {
            key: key.to_string(),
            source,
        }),
    }
}

/// Strictly read the group collection from a store.
///
/// Absent is an empty collection; malformed data and backend failures are
/// errors.
pub fn read_groups<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Result<Vec<Group>, StoreError> {
    decode_groups(key, store.get(key)?)
}

fn write_groups<S: KeyValueStore + ?Sized>(store: &mut S, key: &str, groups: &[Group]) -> Result<(), StoreError> {
    let value = serde_json::to_value(groups).map_err(StoreError::Encode)?;
    store.set(key, value)
}

/// Owner of the group collection.
pub struct GroupStore<S> {
    store: S,
    key: String,
    groups: Vec<Group>,
}

impl<S: KeyValueStore> GroupStore<S> {
    /// Open the collection persisted under `key`.
    pub fn open(store: S, key: impl Into<String>) -> Self {
        let mut this = Self {
            store,
            key: key.into(),
            groups: Vec::new(),
        };
        this.groups = this.load();
        this
    }

    /// Read the persisted collection, falling back to empty when it is
    /// absent or unreadable.
    pub fn load(&self) -> Vec<Group> {
        self.try_load().unwrap_or_else(|e| {
            warn!("Ignoring persisted groups under '{}': {}", self.key, e);
            Vec::new()
        })
    }

    /// Read the persisted collection, reporting unreadable data.
    pub fn try_load(&self) -> Result<Vec<Group>, StoreError> {
        read_groups(&self.store, &self.key)
    }

    /// Overwrite the persisted value with the current collection.
    pub fn save(&mut self) -> Result<(), StoreError> {
        write_groups(&mut self.store, &self.key, &self.groups)
    }

    /// Persist `groups`, then make it the current collection.
    fn commit(&mut self, groups: Vec<Group>) -> Result<(), GroupError> {
        write_groups(&mut self.store, &self.key, &groups)?;
        self.groups = groups;
        Ok(())
    }

    /// Apply `f` to a copy of the named group and commit the result.
    fn update<T>(&mut self, title: &str, f: impl FnOnce(&mut Group) -> T) -> Result<T, GroupError> {
        let mut groups = self.groups.clone();
        let group = groups
            .iter_mut()
            .find(|g| g.title == title)
            .ok_or_else(|| GroupError::GroupNotFound(title.to_string()))?;
        let out = f(group);
        self.commit(groups)?;
        Ok(out)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, title: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.title == title)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append a new active, expanded group with no websites.
    pub fn add_group(&mut self, title: &str) -> Result<(), GroupError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(GroupError::EmptyTitle);
        }
        if self.group(title).is_some() {
            return Err(GroupError::DuplicateGroup(title.to_string()));
        }

        let mut groups = self.groups.clone();
        groups.push(Group::new(title));
        self.commit(groups)?;
        info!("Added group '{}'", title);
        Ok(())
    }

    /// Remove the group with the given title.
    pub fn remove_group(&mut self, title: &str) -> Result<Group, GroupError> {
        let index = self
            .groups
            .iter()
            .position(|g| g.title == title)
            .ok_or_else(|| GroupError::GroupNotFound(title.to_string()))?;

        let mut groups = self.groups.clone();
        let removed = groups.remove(index);
        self.commit(groups)?;
        info!("Removed group '{}'", title);
        Ok(removed)
    }

    /// Canonicalize `raw_url` and append it to the group.
    ///
    /// A domain the group already holds is not an error for the caller: it
    /// is logged and reported as [`WebsiteAdded::AlreadyPresent`].
    pub fn add_website(&mut self, title: &str, raw_url: &str) -> Result<WebsiteAdded, GroupError> {
        let website = canonicalize(raw_url).map_err(|e| GroupError::InvalidUrl(e.0))?;

        match self.try_add_website(title, website) {
            Err(GroupError::DuplicateWebsite { title, website }) => {
                info!("'{}' is already blocked by group '{}'", website, title);
                Ok(WebsiteAdded::AlreadyPresent(website))
            }
            other => other,
        }
    }

    fn try_add_website(&mut self, title: &str, website: String) -> Result<WebsiteAdded, GroupError> {
        let group = self
            .group(title)
            .ok_or_else(|| GroupError::GroupNotFound(title.to_string()))?;
        if group.contains(&website) {
            return Err(GroupError::DuplicateWebsite {
                title: title.to_string(),
                website,
            });
        }

        self.update(title, |g| g.websites.push(website.clone()))?;
        debug!("Added '{}' to group '{}'", website, title);
        Ok(WebsiteAdded::Added(website))
    }

    /// Remove a website from the group. Returns `false` if it was not there.
    pub fn remove_website(&mut self, title: &str, website: &str) -> Result<bool, GroupError> {
        let group = self
            .group(title)
            .ok_or_else(|| GroupError::GroupNotFound(title.to_string()))?;
        let Some(index) = group.websites.iter().position(|w| w == website) else {
            return Ok(false);
        };

        self.update(title, |g| {
            g.websites.remove(index);
        })?;
        debug!("Removed '{}' from group '{}'", website, title);
        Ok(true)
    }

    /// Flip whether the group blocks. Returns the new value.
    pub fn toggle_active(&mut self, title: &str) -> Result<bool, GroupError> {
        let active = self.update(title, |g| {
            g.active = !g.active;
            g.active
        })?;
        info!("Group '{}' is now {}", title, if active { "active" } else { "inactive" });
        Ok(active)
    }

    /// Flip the editor's unfolded state. Returns the new value.
    pub fn toggle_expanded(&mut self, title: &str) -> Result<bool, GroupError> {
        self.update(title, |g| {
            g.expanded = !g.expanded;
            g.expanded
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;
    use crate::GROUPS_KEY;

    /// Store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        down: bool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
            if self.down {
                return Err(StoreError::Unavailable(std::io::Error::other("disk gone")));
            }
            self.inner.set(key, value)
        }
    }

    fn open() -> GroupStore<MemoryStore> {
        GroupStore::open(MemoryStore::new(), GROUPS_KEY)
    }

    fn assert_persisted<S: KeyValueStore>(groups: &GroupStore<S>) {
        assert_eq!(groups.try_load().unwrap(), groups.groups());
    }

    #[test]
    fn test_open_empty() {
        let groups = open();
        assert!(groups.groups().is_empty());
        assert!(groups.load().is_empty());
    }

    #[test]
    fn test_open_existing() {
        let mut store = MemoryStore::new();
        store
            .set(GROUPS_KEY, json!([{"title": "Work", "websites": ["x.com"], "active": true, "expanded": false}]))
            .unwrap();
        let groups = GroupStore::open(store, GROUPS_KEY);
        assert_eq!(groups.groups().len(), 1);
        assert_eq!(groups.group("Work").unwrap().websites, vec!["x.com"]);
    }

    #[test]
    fn test_load_malformed_is_empty() {
        let mut store = MemoryStore::new();
        store.set(GROUPS_KEY, json!({"not": "a list"})).unwrap();
        let groups = GroupStore::open(store, GROUPS_KEY);
        assert!(groups.groups().is_empty());
        assert!(matches!(groups.try_load(), Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn test_add_group() {
        let mut groups = open();
        groups.add_group("Work").unwrap();

        let group = groups.group("Work").unwrap();
        assert!(group.active);
        assert!(group.expanded);
        assert!(group.websites.is_empty());
        assert_persisted(&groups);
    }

    #[test]
    fn test_add_group_duplicate() {
        let mut groups = open();
        groups.add_group("Work").unwrap();
        let before = groups.groups().to_vec();

        let err = groups.add_group("Work").unwrap_err();
        assert!(matches!(err, GroupError::DuplicateGroup(t) if t == "Work"));
        assert_eq!(groups.groups(), before.as_slice());
    }

    #[test]
    fn test_add_group_empty_title() {
        let mut groups = open();
        assert!(matches!(groups.add_group("   "), Err(GroupError::EmptyTitle)));
        assert!(groups.groups().is_empty());
    }

    #[test]
    fn test_remove_group_reindexes() {
        let mut groups = open();
        for title in ["A", "B", "C"] {
            groups.add_group(title).unwrap();
        }

        let removed = groups.remove_group("B").unwrap();
        assert_eq!(removed.title, "B");
        let titles: Vec<&str> = groups.groups().iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
        assert_persisted(&groups);
    }

    #[test]
    fn test_remove_missing_group() {
        let mut groups = open();
        assert!(matches!(groups.remove_group("Nope"), Err(GroupError::GroupNotFound(_))));
    }

    #[test]
    fn test_add_website_normalizes() {
        let mut groups = open();
        groups.add_group("Work").unwrap();

        let added = groups.add_website("Work", "https://mobile.twitter.com/home").unwrap();
        assert_eq!(added, WebsiteAdded::Added("twitter.com".to_string()));
        assert_eq!(groups.group("Work").unwrap().websites, vec!["twitter.com"]);
        assert_persisted(&groups);
    }

    #[test]
    fn test_add_website_invalid() {
        let mut groups = open();
        groups.add_group("Work").unwrap();

        let err = groups.add_website("Work", "not a url").unwrap_err();
        assert!(matches!(err, GroupError::InvalidUrl(raw) if raw == "not a url"));
        assert!(groups.group("Work").unwrap().websites.is_empty());
    }

    #[test]
    fn test_add_website_duplicate_is_swallowed() {
        let mut groups = open();
        groups.add_group("Work").unwrap();
        groups.add_website("Work", "twitter.com").unwrap();

        let rx = groups.store().subscribe();
        let again = groups.add_website("Work", "www.twitter.com/explore").unwrap();
        assert_eq!(again, WebsiteAdded::AlreadyPresent("twitter.com".to_string()));
        assert_eq!(groups.group("Work").unwrap().websites, vec!["twitter.com"]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_add_website_missing_group() {
        let mut groups = open();
        assert!(matches!(
            groups.add_website("Nope", "example.com"),
            Err(GroupError::GroupNotFound(_))
        ));
    }

    #[test]
    fn test_add_then_remove_website_round_trip() {
        let mut groups = open();
        groups.add_group("Work").unwrap();
        groups.add_website("Work", "twitter.com").unwrap();

        assert!(groups.remove_website("Work", "twitter.com").unwrap());
        assert!(groups.group("Work").unwrap().websites.is_empty());
        assert_persisted(&groups);

        assert!(!groups.remove_website("Work", "twitter.com").unwrap());
    }

    #[test]
    fn test_websites_keep_insertion_order() {
        let mut groups = open();
        groups.add_group("Work").unwrap();
        for site in ["c.com", "a.com", "b.com"] {
            groups.add_website("Work", site).unwrap();
        }

        let reopened = GroupStore::open(groups.store().clone(), GROUPS_KEY);
        assert_eq!(reopened.group("Work").unwrap().websites, vec!["c.com", "a.com", "b.com"]);
    }

    #[test]
    fn test_toggle_active_is_involution() {
        let mut groups = open();
        groups.add_group("Work").unwrap();

        assert!(!groups.toggle_active("Work").unwrap());
        assert_persisted(&groups);
        assert!(groups.toggle_active("Work").unwrap());
        assert!(groups.group("Work").unwrap().active);
    }

    #[test]
    fn test_toggle_expanded() {
        let mut groups = open();
        groups.add_group("Work").unwrap();
        assert!(!groups.toggle_expanded("Work").unwrap());
        assert!(!groups.group("Work").unwrap().expanded);
        assert!(groups.group("Work").unwrap().active);
        assert_persisted(&groups);
    }

    #[test]
    fn test_save_restores_persisted_value() {
        let mut groups = open();
        groups.add_group("Work").unwrap();
        groups.add_website("Work", "slack.com").unwrap();

        // Clobber the stored value behind the GroupStore's back
        groups.store.set(GROUPS_KEY, json!([])).unwrap();
        assert!(groups.load().is_empty());

        groups.save().unwrap();
        assert_eq!(groups.load(), groups.groups());
        assert_eq!(groups.group("Work").unwrap().websites, vec!["slack.com"]);
    }

    #[test]
    fn test_save_failure_keeps_memory() {
        let mut groups = GroupStore::open(FlakyStore::default(), GROUPS_KEY);
        groups.add_group("Work").unwrap();

        groups.store.down = true;
        assert!(groups.save().is_err());
        assert_eq!(groups.groups().len(), 1);
    }

    #[test]
    fn test_storage_failure_leaves_memory_unchanged() {
        let mut groups = GroupStore::open(FlakyStore::default(), GROUPS_KEY);
        groups.add_group("Work").unwrap();

        groups.store.down = true;
        let err = groups.add_website("Work", "example.com").unwrap_err();
        assert!(matches!(err, GroupError::StorageUnavailable(_)));
        assert!(groups.group("Work").unwrap().websites.is_empty());
        assert!(matches!(groups.toggle_active("Work"), Err(GroupError::StorageUnavailable(_))));
        assert!(groups.group("Work").unwrap().active);

        // Next operation after recovery writes the full snapshot
        groups.store.down = false;
        groups.add_website("Work", "example.com").unwrap();
        assert_persisted(&groups);
    }
}
