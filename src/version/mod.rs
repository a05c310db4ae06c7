//! Upstream release tracking
//!
//! Builds a lookup from cleaned version strings to release metadata and
//! resolves the version an instance reports against it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Sources   │────▶│  Registry   │◀────│  Resolver   │
//! │(github,gitea)│    │ (version →  │     │ (raw → best │
//! └─────────────┘     │  release)   │     │   record)   │
//!                     └─────────────┘     └─────────────┘
//!                            ▲
//!                     ┌─────────────┐
//!                     │Vulnerability│
//!                     │   rules     │
//!                     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`source`]: Trait for listing a repository's most recent release tags
//! - [`sources`]: Concrete sources (GitHub releases, Gitea/Forgejo tags)
//! - [`registry`]: `VersionRegistry` and the builder that fills it
//! - [`resolver`]: Exact and prefix matching of reported versions
//! - [`vulnerability`]: Known-vulnerable version ranges per repository
//! - [`semver`]: Loose cleaning and coercion of version strings
//! - [`error`]: Error types for source fetches

pub mod error;
pub mod registry;
pub mod resolver;
pub mod semver;
pub mod source;
pub mod sources;
pub mod vulnerability;
