//! TTL Policy Table
//!
//! Static mapping from cache namespace to time-to-live. Detail views that
//! carry live counters get short TTLs, reference lists long ones. The TTL is
//! also the staleness bound when an invalidation is lost.

use std::fmt;
use std::time::Duration;

use crate::domain::Domain;

// == Namespace ==
/// Every namespace the cache layer writes under.
///
/// Names use `.` internally so `:` stays reserved as the key separator and
/// `{namespace}:*` never matches a sibling namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Schemes with their subjects
    AcademicsPrograms,
    /// Resource listings filtered by subject/category/page
    AcademicsNotes,
    AcademicsResource,
    EventsList,
    EventsDetail,
    EventsStats,
    ProjectsList,
    ProjectsDetail,
    /// Album listings, optionally filtered by album type
    GalleryAlbums,
    GalleryAlbum,
    AlumniBatches,
    AlumniBatch,
    /// Jobs, internships and certificates share one listing namespace
    CareersOpportunities,
    CareersOpportunity,
    /// Per-identity like counters
    RateLimitLike,
}

impl Namespace {
    pub const ALL: [Namespace; 15] = [
        Namespace::AcademicsPrograms,
        Namespace::AcademicsNotes,
        Namespace::AcademicsResource,
        Namespace::EventsList,
        Namespace::EventsDetail,
        Namespace::EventsStats,
        Namespace::ProjectsList,
        Namespace::ProjectsDetail,
        Namespace::GalleryAlbums,
        Namespace::GalleryAlbum,
        Namespace::AlumniBatches,
        Namespace::AlumniBatch,
        Namespace::CareersOpportunities,
        Namespace::CareersOpportunity,
        Namespace::RateLimitLike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::AcademicsPrograms => "academics.programs",
            Namespace::AcademicsNotes => "academics.notes",
            Namespace::AcademicsResource => "academics.resource",
            Namespace::EventsList => "events.list",
            Namespace::EventsDetail => "events.detail",
            Namespace::EventsStats => "events.stats",
            Namespace::ProjectsList => "projects.list",
            Namespace::ProjectsDetail => "projects.detail",
            Namespace::GalleryAlbums => "gallery.albums",
            Namespace::GalleryAlbum => "gallery.album",
            Namespace::AlumniBatches => "alumni.batches",
            Namespace::AlumniBatch => "alumni.batch",
            Namespace::CareersOpportunities => "careers.opportunities",
            Namespace::CareersOpportunity => "careers.opportunity",
            Namespace::RateLimitLike => "ratelimit.like",
        }
    }

    // == TTL ==
    /// Time-to-live for values cached under this namespace.
    pub fn ttl(&self) -> Duration {
        let secs = match self {
            Namespace::AcademicsPrograms => 3600,
            Namespace::AcademicsNotes => 900,
            Namespace::AcademicsResource => 300,
            Namespace::EventsList => 600,
            Namespace::EventsDetail => 300,
            Namespace::EventsStats => 1800,
            Namespace::ProjectsList => 900,
            Namespace::ProjectsDetail => 600,
            Namespace::GalleryAlbums => 1800,
            Namespace::GalleryAlbum => 900,
            Namespace::AlumniBatches => 3600,
            Namespace::AlumniBatch => 1800,
            Namespace::CareersOpportunities => 900,
            Namespace::CareersOpportunity => 600,
            Namespace::RateLimitLike => 60,
        };
        Duration::from_secs(secs)
    }

    /// Owning domain; `None` for internal bookkeeping namespaces.
    pub fn domain(&self) -> Option<Domain> {
        match self {
            Namespace::AcademicsPrograms
            | Namespace::AcademicsNotes
            | Namespace::AcademicsResource => Some(Domain::Academics),
            Namespace::EventsList | Namespace::EventsDetail | Namespace::EventsStats => {
                Some(Domain::Events)
            }
            Namespace::ProjectsList | Namespace::ProjectsDetail => Some(Domain::Projects),
            Namespace::GalleryAlbums | Namespace::GalleryAlbum => Some(Domain::Gallery),
            Namespace::AlumniBatches | Namespace::AlumniBatch => Some(Domain::Alumni),
            Namespace::CareersOpportunities | Namespace::CareersOpportunity => {
                Some(Domain::Careers)
            }
            Namespace::RateLimitLike => None,
        }
    }

    /// True for list/aggregate namespaces, evicted by pattern rather than by key.
    pub fn is_list(&self) -> bool {
        !matches!(
            self,
            Namespace::AcademicsResource
                | Namespace::EventsDetail
                | Namespace::ProjectsDetail
                | Namespace::GalleryAlbum
                | Namespace::AlumniBatch
                | Namespace::CareersOpportunity
                | Namespace::RateLimitLike
        )
    }

    /// Detail namespace of a domain.
    pub fn detail_of(domain: Domain) -> Namespace {
        match domain {
            Domain::Academics => Namespace::AcademicsResource,
            Domain::Events => Namespace::EventsDetail,
            Domain::Projects => Namespace::ProjectsDetail,
            Domain::Gallery => Namespace::GalleryAlbum,
            Domain::Alumni => Namespace::AlumniBatch,
            Domain::Careers => Namespace::CareersOpportunity,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
