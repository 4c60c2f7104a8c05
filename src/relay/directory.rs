//! Destination directory - maps destination names to users and groups

use super::{Destination, DestinationKind, RelayError};
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

enum Entry {
    User,
    Group { members: BTreeSet<String> },
}

/// A destination name resolved to its recipients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A single user identity
    Direct(String),
    /// A group and its member identities
    Group { name: String, members: Vec<String> },
}

impl Resolved {
    /// Snapshot of the destination, stamped onto each routed message
    pub fn destination(&self) -> Destination {
        match self {
            Resolved::Direct(identity) => Destination::user(identity.as_str()),
            Resolved::Group { name, .. } => Destination::group(name.as_str()),
        }
    }

    /// Identities that should receive a message sent here
    pub fn recipients(&self) -> &[String] {
        match self {
            Resolved::Direct(identity) => std::slice::from_ref(identity),
            Resolved::Group { members, .. } => members,
        }
    }
}

/// Known users and groups, keyed by unique name
#[derive(Default)]
pub struct Directory {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `identity` as a user destination.
    ///
    /// Idempotent for users; fails if a group already owns the name.
    pub fn register_user(&self, identity: &str) -> Result<(), RelayError> {
        let mut entries = self.write();
        match entries.get(identity) {
            Some(Entry::User) => Ok(()),
            Some(Entry::Group { .. }) => Err(RelayError::NameConflict(identity.to_string())),
            None => {
                entries.insert(identity.to_string(), Entry::User);
                tracing::debug!("Registered user destination '{}'", identity);
                Ok(())
            }
        }
    }

    /// Seed a group with its members.
    ///
    /// Used at startup to load configured groups; fails if the name is taken.
    pub fn insert_group<I, S>(&self, name: &str, members: I) -> Result<(), RelayError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries = self.write();
        if entries.contains_key(name) {
            return Err(RelayError::NameConflict(name.to_string()));
        }

        let members: BTreeSet<String> = members.into_iter().map(Into::into).collect();
        tracing::info!("Seeded group '{}' with {} members", name, members.len());
        entries.insert(name.to_string(), Entry::Group { members });
        Ok(())
    }

    /// Resolve a destination name.
    ///
    /// A user that is currently offline still resolves; only names that
    /// match no user or group fail.
    pub fn resolve(&self, name: &str) -> Result<Resolved, RelayError> {
        match self.read().get(name) {
            Some(Entry::User) => Ok(Resolved::Direct(name.to_string())),
            Some(Entry::Group { members }) => Ok(Resolved::Group {
                name: name.to_string(),
                members: members.iter().cloned().collect(),
            }),
            None => Err(RelayError::UnknownDestination(name.to_string())),
        }
    }

    /// All destinations except the caller's own user entry
    pub fn list_visible_to(&self, caller: &str) -> Vec<Destination> {
        self.read()
            .iter()
            .filter(|(name, entry)| !(matches!(entry, Entry::User) && name.as_str() == caller))
            .map(|(name, entry)| Destination {
                kind: match entry {
                    Entry::User => DestinationKind::User,
                    Entry::Group { .. } => DestinationKind::Group,
                },
                name: name.clone(),
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Group creation is not supported yet
    pub fn create_group(&self, _name: &str, _owner: &str) -> Result<(), RelayError> {
        Err(RelayError::NotImplemented("creating a group chat"))
    }

    /// Joining a group is not supported yet
    pub fn join_group(&self, _name: &str, _member: &str) -> Result<(), RelayError> {
        Err(RelayError::NotImplemented("joining a group chat"))
    }

    /// Leaving a group is not supported yet
    pub fn leave_group(&self, _name: &str, _member: &str) -> Result<(), RelayError> {
        Err(RelayError::NotImplemented("leaving a group chat"))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
