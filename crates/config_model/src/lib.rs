//! # Config Model
//!
//! Typed configuration models bound to a [`config_store::ConfigFile`].
//!
//! Two styles are supported:
//!
//! - **Declarative** models ([`ConfigDataModel`]) hold [`ConfigData`]
//!   wrappers that describe their own section, key, default and constraint.
//!   They run `set_defaults` once, fire model-level pre/post bind events and
//!   can be moved to another file for profile switching.
//! - **Attribute-driven** models ([`ConfigFileModel`]) hold bare
//!   [`ModelEntry`] fields whose metadata is declared at registration. A
//!   [`FileModelHooks`] object customises each bind and receives store
//!   notifications, including unreadable values after a reload.
//!
//! Both report what happened to every member in a [`BindReport`] and log
//! through a named [`LogSource`]; nothing a binder does panics or returns
//! an error to the caller.

pub mod array;
pub mod data;
pub mod data_model;
pub mod error;
pub mod ext;
pub mod file_model;
pub mod log_source;
pub mod member;
pub mod report;

pub use array::{ArrayBindEvent, ConfigArray};
pub use data::{BindContext, BindFallback, ConfigData, PostBindEvent, DEFAULT_NAME, NO_DESCRIPTION};
pub use data_model::{ConfigDataModel, DataModel, ModelContext};
pub use error::BindError;
pub use ext::ConfigFileExt;
pub use file_model::{
    ConfigFileModel, EntryAttributes, EntryRegistry, FileModel, FileModelHooks, ModelEntry, NoHooks,
    OrphanContext, PostBindContext, PreBindContext,
};
pub use log_source::{LogLevel, LogSource};
pub use member::{BindableMember, MemberBinding, MemberBound, MemberRegistry, ProfileSwitch, SharedMember};
pub use report::{BindReport, MemberReport, MemberStatus};
