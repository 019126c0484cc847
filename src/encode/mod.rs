//! Still-image encoding of flattened composites.

/// PNG post-compression hook.
pub mod png_opt;
/// JPEG and PNG encoders and quality selection.
pub mod still;
