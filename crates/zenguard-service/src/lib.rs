//! Zenguard session engine.
//!
//! Async runtime for focus sessions: a single serialized event loop around
//! [`zenguard_core`]'s action-based controller, one-second tick sources, and
//! persistent settings.
//!
//! # Architecture
//!
//! The [`SessionController`](zenguard_core::SessionController) follows the
//! Sans-IO pattern and never touches a clock, the screen or the disk. The
//! [`Engine`] owns it, feeds it every event in arrival order, and executes
//! the returned actions against the [`Presentation`], [`LockMode`] and
//! [`SettingsStore`] collaborators.
//!
//! # Components
//!
//! - [`Engine`] and [`EngineHandle`]: the event loop and its cloneable front
//! - [`Presentation`] and [`LockMode`]: platform contracts
//! - [`SettingsStore`]: allow-list slots and the session record
//! - [`feed`]: newline-delimited JSON host feed used by the binary
//! - [`SystemEnv`]: production environment (real time)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod console;
mod engine;
pub mod feed;
mod lock_mode;
mod presentation;
pub mod storage;
mod system_env;
mod ticker;

pub use console::{ConsoleLockMode, ConsolePresentation};
pub use engine::{Engine, EngineConfig, EngineError, EngineHandle, EngineMessage, KeyDisposition};
pub use feed::{FeedError, FeedMessage};
pub use lock_mode::{LockMode, LockModeDenied};
pub use presentation::{Presentation, PresentationError, ShowRequest};
pub use storage::{
    AllowListSlots, ChaoticSettingsStore, MemorySettingsStore, RedbSettingsStore, SessionRecord,
    SettingsStore, StorageError,
};
pub use system_env::SystemEnv;
pub use ticker::TickerHandle;
