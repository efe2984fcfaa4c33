//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area. Every handler
//! receives the authenticated `AuthUser` and scopes its queries to it.

pub mod audit;
pub mod banks;
pub mod categories;
pub mod categorize;
pub mod currencies;
pub mod imports;
pub mod keywords;
pub mod me;
pub mod reports;
pub mod rules;
pub mod transactions;

// Re-export all handlers for use in router
pub use audit::*;
pub use banks::*;
pub use categories::*;
pub use categorize::*;
pub use currencies::*;
pub use imports::*;
pub use keywords::*;
pub use me::*;
pub use reports::*;
pub use rules::*;
pub use transactions::*;
