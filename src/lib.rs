//! Resource SDK: declarative REST resources over pluggable storage.
//!
//! Each registered resource scope gets list/create/read/update/delete routes. List and
//! read requests accept whitelisted query-string directives (`filter`, `include`,
//! `scope`, `sort`, `page`, `limit`) that are parsed, checked against the scope's
//! allow-lists and applied to the storage query in a fixed order.

pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod policy;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;
pub mod upload;

pub use config::{
    build_registry, load_from_env, load_from_path, load_from_str, ControllerDefaults, FullConfig,
    ModelBinding, ResourceOptions, ResourceRegistry, RouteConfigResolver,
};
pub use context::RequestContext;
pub use directive::{
    parse_request, FilterOperator, FilterValue, QueryBuilder, QueryDirectives, RawQuery,
    ResourceQueryApplier,
};
pub use error::{ApiError, ConfigError, ValidationErrors};
pub use policy::{Action, Authenticator, Authorizer, OwnerAuthorizer, Principal};
pub use response::{error_body, success_one, success_page, DefaultSerializer, Serializer};
pub use routes::{common_routes, resource_routes};
pub use service::{DefaultHooks, Payload, ResourceController, ResourceHooks, Resources};
pub use state::ResourceState;
pub use store::{Page, PgStore, Record, Storage};
pub use upload::{LocalUploadStore, UploadStore, UploadedFile};
