// Adapters layer: concrete implementations for external systems (sheets, auth, local files).

pub mod csv_sheet;
pub mod google_auth;
pub mod sheets;

pub use csv_sheet::CsvSheet;
pub use google_auth::{GoogleAuthenticator, StaticToken};
pub use sheets::GoogleSheets;
