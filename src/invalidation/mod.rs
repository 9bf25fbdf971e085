//! Invalidation Module
//!
//! Typed fan-out from committed domain mutations to cache evictions. Each
//! domain registers one [`MutationSource`] at startup; the [`Invalidator`]
//! never guesses across domains.

mod dispatcher;
mod event;
mod sources;

pub use dispatcher::{InvalidationReport, Invalidator, InvalidatorBuilder};
pub use event::{EventContext, InvalidationEvent, MutationKind, Scope, Subject};
pub use sources::{
    default_sources, AcademicsSource, AlumniSource, CareersSource, EventsSource, Eviction,
    GallerySource, MutationSource, ProjectsSource,
};
