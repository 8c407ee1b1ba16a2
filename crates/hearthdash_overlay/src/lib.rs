//! Configuration resolution for the dashboard: a read-only catalog merged with
//! a persisted, versioned user overlay.

pub mod catalog;
pub mod model;
pub mod overlay;
pub mod resolve;
pub mod storage;
pub mod validation;

pub use catalog::Catalog;
pub use catalog::CatalogError;
pub use overlay::OverlayStore;
pub use overlay::StoreError;
pub use resolve::resolve_view;
pub use resolve::ResolvedView;
pub use validation::ValidationError;
pub use validation::ValidationReport;
