//! Session and profile-provisioning core for the folio portfolio platform.
//!
//! Authenticated users manage profile metadata; anonymous visitors read
//! published profiles. The crate owns three engineered pieces: the edge
//! session resolver, the profile provisioning saga, and the client session
//! context state machine. Everything else (identity issuance, profile rows)
//! lives behind the ports in [`domain::ports`].

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;

pub use doc::ApiDoc;
pub use middleware::trace::Trace;
