//! # libris ILS
//!
//! Transport and protocol drivers for the Integrated Library System.
//!
//! - [`transport`] sends one HTTP request and parses the XML answer.
//! - [`driver`] defines the [`IlsDriver`] capability trait.
//! - [`xserver`] and [`restxml`] implement it for the two supported dialects.
//! - [`dates`] normalizes the date formats ILS installations emit.
//! - [`new_items`] caches new-item searches per session.
//!
//! ```no_run
//! use libris_ils::{IlsDriver, IlsTransport, RestXmlConfig, RestXmlDriver, TransportConfig};
//! use libris_core::{ConfigProvider, StaticConfigProvider};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = StaticConfigProvider::default()
//!     .with("Catalog", "url", "https://ils.example.org/api/v1")
//!     .with("Catalog", "api_key", "secret-key");
//! let config = RestXmlConfig::from_section(&provider.section("Catalog"))?;
//! let driver = RestXmlDriver::new(config, IlsTransport::new(&TransportConfig::default())?);
//! let holdings = driver.fetch_holdings("991234", None).await?;
//! println!("{} copies", holdings.len());
//! # Ok(())
//! # }
//! ```

pub mod dates;
pub mod driver;
pub mod error;
pub mod holding;
pub mod new_items;
pub mod profile;
pub mod restxml;
pub mod transport;
pub mod xml;
pub mod xserver;

pub use dates::{parse_ils_date, parse_optional_date};
pub use driver::{IlsDriver, REPLY_ERROR_STATUS};
pub use error::{IlsError, IlsResult};
pub use holding::{AvailabilityRules, Holding, HoldingStatus, RawItem};
pub use new_items::NewItemsCache;
pub use profile::{Address, PatronProfile, ProfileUpdate};
pub use restxml::{RestXmlConfig, RestXmlDriver};
pub use transport::{IlsResponse, IlsTransport, TransportConfig};
pub use xml::XmlElement;
pub use xserver::{XServerConfig, XServerDriver};
