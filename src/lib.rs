//! artframe composites artwork into photographed picture frames.
//!
//! A frame is a background photo plus the four labeled corners of its opening. Artwork is
//! perspective-warped so its rectangle lands on those corners and pasted in only where the
//! opening's mask is set:
//!
//! - [`composite`] / [`composite_bytes`] for a single image
//! - [`BatchRunner::run_batch`] for many images against one frame, producing a
//!   [`SessionLedger`]
//! - [`FrameCatalog`] to register frame photos and their corners on disk
#![forbid(unsafe_code)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod frames;
pub mod geometry;
pub mod render;
pub mod session;

pub use crate::assets::decode::{decode_image, load_image, save_image};
pub use crate::config::{BatchOpts, StorageConfig};
pub use crate::foundation::core::{Canvas, PixelPoint};
pub use crate::foundation::error::{FrameError, FrameResult};
pub use crate::frames::catalog::{CoordinatesFile, FrameCatalog, FrameRecord};
pub use crate::geometry::homography::Homography;
pub use crate::geometry::quad::Quad;
pub use crate::render::composite::{composite, composite_bytes};
pub use crate::render::mask::quad_mask;
pub use crate::render::overlay::draw_corner_overlay;
pub use crate::render::warp::warp_perspective;
pub use crate::session::ledger::{ItemOutcome, ItemRecord, OutputRef, SessionId, SessionLedger};
pub use crate::session::output::{FsOutputStore, InMemoryOutputStore, OutputStore};
pub use crate::session::runner::{ArtworkItem, BatchRunner, output_filename};
pub use crate::session::store::{FsLedgerStore, InMemoryLedgerStore, LedgerStore};
