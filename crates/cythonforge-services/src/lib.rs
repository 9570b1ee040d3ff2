//! Entry-neutral service layer. The CLI and editor bridges drive everything
//! through [`ForgeService`].

pub mod error;
pub mod forge;

pub use error::{Result, ServiceError};
pub use forge::{FolderCheck, ForgeService};
