//! External collaborators consulted by the resolution cascade.
//!
//! Every lookup returns `Result<Option<T>>`: absence is a normal outcome the
//! cascade falls through on, never an error. Provider errors are surfaced as
//! `GeoError` and downgraded to "no match" by the cascade itself.

pub mod boundary;
pub mod cadastral;
pub mod electoral;
pub mod geocoder;

pub use boundary::{BoundaryProvider, SqliteBoundary};
pub use cadastral::{CadastralProvider, SqliteCadastral};
pub use electoral::{ElectoralProvider, SqliteElectoral};
pub use geocoder::{Geocoder, GoogleMapsClient, NominatimClient};
