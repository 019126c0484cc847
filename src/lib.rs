//! dualframe turns premultiplied-alpha RGBA animation frames into dual-channel composites.
//!
//! Each output image is twice the source width: one half carries straight (un-premultiplied)
//! color, the other half carries alpha as grayscale. The composite is flattened over black and
//! encoded as an opaque JPEG or PNG, so players without alpha support can rebuild transparency.
//!
//! - Configure a [`Composer`] with a [`ComposerConfig`]
//! - Call [`Composer::compose`] with frames and [`ComposeOptions`]
//! - Receive one [`EncodedFrame`] per input frame, in input order
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Pixel transform and block scheduling.
pub mod compose;
/// Still-image encoding.
pub mod encode;
/// Buffer pools.
pub mod memory;
/// Orchestration API.
pub mod session;
/// Background workers.
pub mod worker;

pub use crate::foundation::core::{BYTES_PER_PIXEL, ChannelMode, Dimensions, Frame};
pub use crate::foundation::error::{DualFrameError, DualFrameResult};

pub use crate::compose::scheduler::{Block, BlockScheduler, CompositeBuffer, FlattenedBuffer};
pub use crate::compose::transform::{TransformedPixel, transform_pixel};
pub use crate::encode::png_opt::{PngOptimizer, RecompressPng, optimize_png_or_passthrough};
pub use crate::encode::still::{EncodedFrame, OutputFormat, adaptive_quality};
pub use crate::memory::pool::{BufferPool, BytePool, PoolOpts, PoolStats, PooledBuffer};
pub use crate::session::composer::{ComposeStats, Composer};
pub use crate::session::config::ComposerConfig;
pub use crate::session::options::ComposeOptions;
