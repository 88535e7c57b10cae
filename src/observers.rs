//! Observers that export instrument state in richer formats than the
//! built-in CSV-like summaries.
//!
//! - [`table`] - Pretty-print registries as tables using the `tabled` crate
//! - [`json`] - Serialize a whole instrumentation context to JSON
//!
//! # Unified Error Handling
//!
//! All observers use a unified [`ObserverError`] type.
//!
//! # Feature Flags
//!
//! - `table` - Enables the [`table`] module
//! - `json` - Enables the [`json`] module
//! - `full` - Enables all observer modules
//!
//! # Example
//!
//! ```rust,ignore
//! use hedron_instrument::instrumentation::Instrumentation;
//! use hedron_instrument::observers::Result;
//!
//! fn export(instruments: &Instrumentation) -> Result<()> {
//!     #[cfg(feature = "table")]
//!     {
//!         use hedron_instrument::observers::table::TableObserver;
//!         println!("{}", TableObserver::new().render_all(instruments, true));
//!     }
//!
//!     #[cfg(feature = "json")]
//!     {
//!         use hedron_instrument::observers::json::JsonObserver;
//!         JsonObserver::new().pretty(true).write_to(std::io::stdout(), instruments, true)?;
//!     }
//!
//!     Ok(())
//! }
//! ```

mod error;

pub use error::{ObserverError, Result};

#[cfg(feature = "table")]
pub mod table;

#[cfg(feature = "json")]
pub mod json;
