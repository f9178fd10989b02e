//! # Config Store
//!
//! A persisted, typed settings store. Settings are identified by a section
//! and key, carry a description and an optional constraint, and are saved to
//! an INI-like text file:
//!
//! ```text
//! [General]
//!
//! ## How many players may join
//! # Setting type: i32
//! # Default value: 8
//! MaxPlayers = 8
//! ```
//!
//! ```
//! use config_store::{ConfigDescription, ConfigFile};
//!
//! let file = ConfigFile::in_memory();
//! let players = file
//!     .bind("General", "MaxPlayers", 8, ConfigDescription::new("How many players may join"))
//!     .unwrap();
//!
//! let _sub = players.on_setting_changed(|change| {
//!     println!("{} is now {}", change.definition, change.new_value);
//! });
//! players.set_value(16);
//! assert_eq!(players.value(), 16);
//! ```

pub mod acceptable;
pub mod definition;
pub mod entry;
pub mod error;
pub mod events;
pub mod file;
mod format;
pub mod utils;
pub mod value;

pub use acceptable::AcceptableValues;
pub use definition::{ConfigDefinition, ConfigDescription};
pub use entry::{ConfigEntry, UntypedEntry};
pub use error::{ConfigError, ConversionError};
pub use events::{ChangeSource, ConfigReloadedEvent, Event, SettingChangedEvent, Subscription};
pub use file::{ConfigFile, WeakConfigFile};
pub use value::{RawValue, SettingValue};
