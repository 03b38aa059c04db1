//! Loads and serves static game-asset data for a plugin-hosting runtime.
//!
//! The host hands [`DataManager::new`] a catalog and a [`StartInfo`]; from then on
//! plugins read rows, files, icons and opcode tables through the manager. Startup
//! also kicks off the region patch, the pending-load pump and a background refresh
//! of the opcode tables.

pub mod catalog;
pub mod language;
pub mod manager;
pub mod opcodes;
pub mod pump;
pub mod region;

pub use catalog::{AssetCatalog, DataCenterRecord, DataCenterRef, MemoryCatalog, WorldRecord};
pub use language::Language;
pub use manager::{DataManager, StartInfo};
pub use opcodes::{OpcodeStore, OpcodeTable};
