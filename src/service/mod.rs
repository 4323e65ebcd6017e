//! Resource lifecycle services: controller, hooks, payloads and validation.

pub mod controller;
pub mod hooks;
pub mod payload;
pub mod resources;
pub mod validation;

pub use controller::ResourceController;
pub use hooks::{DefaultHooks, ResourceHooks};
pub use payload::Payload;
pub use resources::{ControllerBinding, Resources, DEFAULT_BODY_LIMIT, DEFAULT_SERIALIZER};
pub use validation::{restrict_rules, RequestValidator};
