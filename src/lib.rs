//! taskstore: cross-process session/task store
//!
//! A small JSON document (`{ version, sessions }`) shared by independent
//! processes: CLI invocations, background runners and tool servers. Writers
//! serialize through an exclusive-create lock file, re-read and merge the
//! latest document field by field inside the lock, and replace the file by
//! atomic rename. Readers never lock and never see a partial document.
//!
//! # Quick Start
//!
//! ```no_run
//! use taskstore::prelude::*;
//!
//! # async fn example() -> taskstore::error::Result<()> {
//! let service = TaskService::new(StoreConfig::discover()?);
//! let mut store = service.load(None).await;
//! store
//!     .entry_mut("attempt-42")
//!     .set("status", "running");
//! let merged = service.save(&store).await?.store;
//! println!("{} sessions", merged.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod prelude;
pub mod store;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
