//! Domain adapters.
//!
//! Each CRUD module owns a set of namespaces and states, per mutation, which
//! keys or namespaces must go. The listing key helpers live next to the
//! adapter so readers and invalidators agree on key shape.

use crate::cache::{CacheKey, Namespace};
use crate::domain::Domain;
use crate::invalidation::event::{InvalidationEvent, Scope, Subject};

/// One unit of eviction work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eviction {
    /// A single exact key
    Key(CacheKey),
    /// Every key under the namespace prefix
    Namespace(Namespace),
}

/// Implemented by every domain module and registered with the dispatcher at
/// startup. Must only name keys of its own domain.
pub trait MutationSource: Send + Sync {
    /// Domain this adapter is registered for.
    fn domain(&self) -> Domain;

    /// Keys and namespaces to drop after `event` committed.
    fn evictions(&self, event: &InvalidationEvent) -> Vec<Eviction>;
}

fn detail(domain: Domain, id: i64) -> Eviction {
    Eviction::Key(CacheKey::detail(Namespace::detail_of(domain), id))
}

/// Detail key of the entity itself, or of its parent for child records.
/// List-scoped primary events address no single entity.
fn addressed_detail(domain: Domain, event: &InvalidationEvent) -> Option<Eviction> {
    match (event.subject, event.scope) {
        (Subject::Child, _) => event.context.parent_id.map(|id| detail(domain, id)),
        (Subject::Primary, Scope::Single) => event.entity_id.map(|id| detail(domain, id)),
        (Subject::Primary, Scope::List) | (Subject::Reference, _) => None,
    }
}

// == Academics ==
#[derive(Debug, Default, Clone, Copy)]
pub struct AcademicsSource;

impl AcademicsSource {
    /// Scheme and subject tree shown on the programs page.
    pub fn programs_key() -> CacheKey {
        CacheKey::builder(Namespace::AcademicsPrograms).build()
    }

    /// Resource listing, filtered by subject, category and page.
    pub fn notes_key(
        subject_id: Option<i64>,
        category: Option<&str>,
        page: Option<u32>,
    ) -> CacheKey {
        CacheKey::builder(Namespace::AcademicsNotes)
            .param("subject", subject_id)
            .param("category", category)
            .param("page", page)
            .build()
    }
}

impl MutationSource for AcademicsSource {
    fn domain(&self) -> Domain {
        Domain::Academics
    }

    fn evictions(&self, event: &InvalidationEvent) -> Vec<Eviction> {
        match event.subject {
            // schemes and subjects only feed the programs listing
            Subject::Reference => vec![Eviction::Namespace(Namespace::AcademicsPrograms)],
            Subject::Primary | Subject::Child => addressed_detail(Domain::Academics, event)
                .into_iter()
                .chain([Eviction::Namespace(Namespace::AcademicsNotes)])
                .collect(),
        }
    }
}

// == Events ==
#[derive(Debug, Default, Clone, Copy)]
pub struct EventsSource;

impl EventsSource {
    pub fn list_key(status: Option<&str>, page: Option<u32>) -> CacheKey {
        CacheKey::builder(Namespace::EventsList)
            .param("status", status)
            .param("page", page)
            .build()
    }

    pub fn stats_key() -> CacheKey {
        CacheKey::builder(Namespace::EventsStats).build()
    }
}

impl MutationSource for EventsSource {
    fn domain(&self) -> Domain {
        Domain::Events
    }

    fn evictions(&self, event: &InvalidationEvent) -> Vec<Eviction> {
        let mut out: Vec<Eviction> = addressed_detail(Domain::Events, event).into_iter().collect();
        // registrations (children) change the stats, not the listing
        if event.subject != Subject::Child {
            out.push(Eviction::Namespace(Namespace::EventsList));
        }
        out.push(Eviction::Key(Self::stats_key()));
        out
    }
}

// == Projects ==
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectsSource;

impl ProjectsSource {
    pub fn list_key(category: Option<&str>, page: Option<u32>) -> CacheKey {
        CacheKey::builder(Namespace::ProjectsList)
            .param("category", category)
            .param("page", page)
            .build()
    }
}

impl MutationSource for ProjectsSource {
    fn domain(&self) -> Domain {
        Domain::Projects
    }

    fn evictions(&self, event: &InvalidationEvent) -> Vec<Eviction> {
        let mut out: Vec<Eviction> =
            addressed_detail(Domain::Projects, event).into_iter().collect();
        // images, videos and team members only show on the detail page
        if event.subject != Subject::Child {
            out.push(Eviction::Namespace(Namespace::ProjectsList));
        }
        out
    }
}

// == Gallery ==
#[derive(Debug, Default, Clone, Copy)]
pub struct GallerySource;

impl GallerySource {
    /// Album listing, `None` for the unfiltered "all albums" view.
    pub fn albums_key(album_type: Option<&str>) -> CacheKey {
        CacheKey::builder(Namespace::GalleryAlbums)
            .param("type", album_type)
            .build()
    }
}

impl MutationSource for GallerySource {
    fn domain(&self) -> Domain {
        Domain::Gallery
    }

    fn evictions(&self, event: &InvalidationEvent) -> Vec<Eviction> {
        let mut out: Vec<Eviction> =
            addressed_detail(Domain::Gallery, event).into_iter().collect();
        // photos are nested in the album detail only
        if event.subject != Subject::Child {
            // every typed listing: a retyped album must leave its old listing
            out.push(Eviction::Namespace(Namespace::GalleryAlbums));
        }
        out
    }
}

// == Alumni ==
#[derive(Debug, Default, Clone, Copy)]
pub struct AlumniSource;

impl AlumniSource {
    pub fn batches_key(page: Option<u32>) -> CacheKey {
        CacheKey::builder(Namespace::AlumniBatches)
            .param("page", page)
            .build()
    }
}

impl MutationSource for AlumniSource {
    fn domain(&self) -> Domain {
        Domain::Alumni
    }

    fn evictions(&self, event: &InvalidationEvent) -> Vec<Eviction> {
        addressed_detail(Domain::Alumni, event)
            .into_iter()
            .chain([Eviction::Namespace(Namespace::AlumniBatches)])
            .collect()
    }
}

// == Careers ==
#[derive(Debug, Default, Clone, Copy)]
pub struct CareersSource;

impl CareersSource {
    /// `kind` is job, internship or certificate; `None` lists all.
    pub fn opportunities_key(kind: Option<&str>, page: Option<u32>) -> CacheKey {
        CacheKey::builder(Namespace::CareersOpportunities)
            .param("kind", kind)
            .param("page", page)
            .build()
    }
}

impl MutationSource for CareersSource {
    fn domain(&self) -> Domain {
        Domain::Careers
    }

    fn evictions(&self, event: &InvalidationEvent) -> Vec<Eviction> {
        addressed_detail(Domain::Careers, event)
            .into_iter()
            .chain([Eviction::Namespace(Namespace::CareersOpportunities)])
            .collect()
    }
}

/// One adapter per domain.
pub fn default_sources() -> Vec<Box<dyn MutationSource>> {
    vec![
        Box::new(AcademicsSource),
        Box::new(EventsSource),
        Box::new(ProjectsSource),
        Box::new(GallerySource),
        Box::new(AlumniSource),
        Box::new(CareersSource),
    ]
}
