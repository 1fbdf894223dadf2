//! Client side of the spreadsheet-backed data store: service account
//! credentials, A1 cell addressing and the tabular read/write API.

pub mod a1;
pub mod credentials;
pub mod google;
pub mod store;
pub mod testutils;

pub use a1::{CellAddress, SheetRange, column_letter};
pub use credentials::{CredentialError, CredentialSource, ServiceAccountKey};
pub use google::GoogleSheetsProvider;
pub use store::{Grid, SheetsError, StoreProvider, TabularStore};
