//! Domain primitives, services, and ports.
//!
//! Purpose: define the strongly typed entities and use-cases shared by the
//! HTTP adapter and the persistence/identity adapters. Types stay immutable
//! where practical and document their invariants and serde contracts in each
//! type's Rustdoc.

pub mod error;
pub mod events;
pub mod identity;
pub mod ports;
pub mod profile;
pub mod provisioning;
pub mod routes;
pub mod session_context;

pub use self::error::{Error, ErrorCode};
pub use self::events::{AuthEvent, AuthEventHub, AuthSubscription};
pub use self::identity::{
    Identity, LoginCredentials, LoginValidationError, ProviderMetadata, SessionRecord,
};
pub use self::profile::{
    NewProfile, Profile, ProfileChanges, Theme, Username, UsernameValidationError,
};
pub use self::provisioning::{
    NewSignUp, OAuthCallbackError, ProfileProvisioner, SignInError, SignUpError, SignUpOutcome,
};
pub use self::routes::RouteClass;
pub use self::session_context::{AuthSnapshot, SessionContext, SessionContextConfig};

/// Convenient API result alias.
pub type ApiResult<T> = Result<T, Error>;
