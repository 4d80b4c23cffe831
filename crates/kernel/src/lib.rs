//! Basket Kernel
//!
//! Everything the protocol modules share:
//! - `Controller`: protocol owner, fee recipient, enabled modules, registered baskets, module fees
//! - `ProtocolConfig`: JSON-loadable protocol parameters
//! - `Env`: borrowed view of protocol state handed to a module for one operation
//! - `ModuleIssuanceHook` / `ManagerIssuanceHook` / `IssuanceRegistrar`: issuance seams
//! - `ModuleError` + `ErrorKind`: failure reasons and their classification

pub mod config;
pub mod controller;
pub mod env;
pub mod error;
pub mod hooks;

pub use config::{ConfigError, ProtocolConfig};
pub use controller::Controller;
pub use env::Env;
pub use error::{ErrorKind, ModuleError};
pub use hooks::{HookSet, IssuanceRegistrar, ManagerIssuanceHook, ModuleIssuanceHook};
