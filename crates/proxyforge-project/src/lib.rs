//! ProxyForge Project - asset lifecycle and proxy orchestration
//!
//! This crate handles:
//! - The asset registry and its loading/loaded/errored/proxy sets
//! - Recovery of assets whose resource went missing
//! - Sequential proxy generation and timeline substitution
//! - The `Project` facade, its events and its message loop

mod bindings;
pub mod error;
mod message;
pub mod project;
pub mod proxy;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod signals;

pub use bindings::TimelineBindings;
pub use error::{ProjectError, ProjectResult};
pub use project::Project;
pub use proxy::{ProxyFailure, ProxyOrchestrator, ProxyState, StartOutcome};
pub use registry::AssetRegistry;
pub use resolver::{MissingResourceResolver, Retry};
pub use settings::ProjectSettings;
pub use signals::{ProjectEvent, Signals, SubscriptionId};
