//! The User Overlay: every user customization, its persisted form, schema
//! migration and backup import/export.

mod envelope;
mod import;
mod migrate;
mod store;

pub use envelope::Envelope;
pub use envelope::ExportScope;
pub use envelope::OverlayDocument;
pub use envelope::StoredEnvelope;
pub use import::decode_document;
pub use import::parse_import;
pub use import::validate_import;
pub use import::ImportError;
pub use import::ImportMode;
pub use migrate::migrate;
pub use migrate::upgrade;
pub use migrate::MigrationDefaults;
pub use migrate::CURRENT_VERSION;
pub use store::ImportSummary;
pub use store::OverlayStore;
pub use store::ReservedIds;
pub use store::StoreError;
