//! Mutation events raised by domain modules after a successful commit.

use serde::Serialize;

use crate::domain::Domain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
}

/// Whether an event addresses one entity's detail view or whole listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Single,
    List,
}

/// Which record inside a domain changed.
///
/// Most domains have one primary entity; the rest are children or
/// reference data whose changes fan out differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// The domain's primary entity (resource, event, project, album, batch, opportunity)
    Primary,
    /// Reference data shown in listings (schemes, subjects)
    Reference,
    /// A record nested inside a parent (photo, project image/video/team member)
    Child,
}

/// Extra identifiers some adapters need to pick keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventContext {
    /// Owning entity for child records (album of a photo, project of an image)
    pub parent_id: Option<i64>,
    /// Listing partition the entity lives in (album type, opportunity kind).
    /// Logged with the dispatch; adapters evict whole listing namespaces
    /// because the previous partition is unknown after an update.
    pub category: Option<String>,
}

/// Ephemeral description of a committed mutation, consumed at once by the
/// dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationEvent {
    pub domain: Domain,
    pub kind: MutationKind,
    pub subject: Subject,
    pub entity_id: Option<i64>,
    pub scope: Scope,
    pub context: EventContext,
}

impl InvalidationEvent {
    /// Event for the primary entity; scope follows from `entity_id`.
    pub fn new(domain: Domain, kind: MutationKind, entity_id: Option<i64>) -> Self {
        Self {
            domain,
            kind,
            subject: Subject::Primary,
            entity_id,
            scope: if entity_id.is_some() {
                Scope::Single
            } else {
                Scope::List
            },
            context: EventContext::default(),
        }
    }

    /// A new entity was committed.
    pub fn created(domain: Domain, entity_id: i64) -> Self {
        Self::new(domain, MutationKind::Created, Some(entity_id))
    }

    /// An existing entity changed.
    pub fn updated(domain: Domain, entity_id: i64) -> Self {
        Self::new(domain, MutationKind::Updated, Some(entity_id))
    }

    /// An entity was removed.
    pub fn deleted(domain: Domain, entity_id: i64) -> Self {
        Self::new(domain, MutationKind::Deleted, Some(entity_id))
    }

    /// A child record of `parent_id` changed.
    pub fn child(domain: Domain, kind: MutationKind, child_id: i64, parent_id: i64) -> Self {
        Self {
            subject: Subject::Child,
            context: EventContext {
                parent_id: Some(parent_id),
                category: None,
            },
            ..Self::new(domain, kind, Some(child_id))
        }
    }

    /// Reference data of the domain changed; only listings are affected.
    pub fn reference(domain: Domain, kind: MutationKind) -> Self {
        Self {
            subject: Subject::Reference,
            ..Self::new(domain, kind, None)
        }
    }

    /// Sets the owning entity.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.context.parent_id = Some(parent_id);
        self
    }

    /// Sets the listing partition.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.context.category = Some(category.into());
        self
    }
}
