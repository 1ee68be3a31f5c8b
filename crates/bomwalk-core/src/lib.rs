//! # bomwalk-core
//!
//! The product-structure configuration engine for bomwalk - THE RESOLVER.
//!
//! Given a root part and a configuration policy, the resolver walks a
//! versioned bill-of-materials graph into one concrete tree of parts and
//! reports every place where the policy picks zero or several revisions or
//! links.
//!
//! ## Layout
//!
//! - `types`, `primitives`: identity keys, errors and constants
//! - `product`, `effectivity`: the part data model and validity windows
//! - `filter`, `observer`: the policy and the event hooks of a walk
//! - `resolver`, `component`: the walk and its output tree
//! - `baseline`: frozen configurations captured from a walk
//! - `catalog`, `storage`, `formats`: in-memory and redb-backed stores,
//!   record and snapshot formats
//!
//! ## Architectural Constraints
//!
//! - Pure Rust, no async, no network dependencies
//! - The resolver performs no I/O itself; parts come from an injected store
//! - `BTreeMap`/`BTreeSet` only, so every listing is deterministic

// =============================================================================
// MODULES
// =============================================================================

pub mod baseline;
pub mod catalog;
pub mod component;
pub mod effectivity;
pub mod filter;
pub mod formats;
pub mod observer;
pub mod primitives;
pub mod product;
pub mod resolver;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{BomError, ConfigurationItemKey, PartIterationKey, PartMasterKey, PartRevisionKey};

pub use product::{
    ConfigurationItem, PartIteration, PartLink, PartMaster, PartRevision, PartSubstituteLink,
    PartUsageLink, RevisionStatus, path_to_string,
};

pub use effectivity::{Effectivity, EffectivityContext, EffectivityManager, EffectivityRange};

// =============================================================================
// RE-EXPORTS: Resolution
// =============================================================================

pub use component::{Component, ComponentSummary};
pub use filter::{
    BaselineCreationFilter, BaselineType, ConfigurationFilter, EffectivityFilter, LatestFilter,
    ReleasedFilter,
};
pub use observer::{
    CollectingObserver, NoopObserver, PathWalk, ResolutionEvent, ResolutionObserver,
    StrictObserver,
};
pub use resolver::{ConfigurationResolver, StopHandle};

// =============================================================================
// RE-EXPORTS: Baselines and Storage
// =============================================================================

pub use baseline::{BaselineCapture, BaselineFilter, BaselineRequest, BaselinedPart, ProductBaseline};
pub use catalog::{BaselineStore, Catalog, PartRepository, PartStore, decode_path};
pub use formats::{CatalogSnapshot, ImportSummary, PersistenceHeader, decode_record, encode_record};
pub use storage::RedbCatalog;
