//! Server-side link resolution.
//!
//! Pure functions and small value types: nothing here performs I/O. The link
//! lookup itself belongs to `deeplinker_store`; the HTTP surface lives in the
//! `deeplinker` binary crate.

pub mod alias;
pub mod deeplink;
pub mod platform;
pub mod query;
pub mod resolver;

pub use alias::RouteAliasRewriter;
pub use deeplink::{build_deeplink, parse_deeplink, ParsedDeeplink};
pub use platform::{detect_platform, resolve_platform, validate_platform_override};
pub use query::{first_query_param, merge_query_params, try_merge_query_params, MergeError};
pub use resolver::{LinkResolver, RedirectDecision, ResolveError};
