//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the connector.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Record Model
//! - A `Record` is an opaque payload; its `index` is the position in the input
//!   sequence and is only used for ordering and reporting
//! - Every record ends up in exactly one `Batch` and is accounted exactly once
//!   in the `DispatchReport`

mod api_name;
mod blueprint;
mod dispatch_config;
mod error;
mod record;
mod report;
mod result;
mod uploader;

pub use api_name::ApiName;
pub use blueprint::*;
pub use dispatch_config::*;
pub use error::*;
pub use record::*;
pub use report::*;
pub use result::*;
pub use uploader::{LocalUploader, Uploader};
