use std::sync::Arc;

use crate::encode::png_opt::PngOptimizer;
use crate::encode::still::OutputFormat;
use crate::foundation::core::ChannelMode;

/// Progress callback. Receives a non-decreasing fraction in `[0, 1]`.
pub type ProgressFn<'a> = Box<dyn FnMut(f64) + Send + 'a>;
/// Cancellation callback. Returning `true` stops the call with [`crate::DualFrameError::Cancelled`].
pub type CancelFn<'a> = Box<dyn FnMut() -> bool + Send + 'a>;

/// Per-call options. Unset fields fall back to the composer's [`crate::ComposerConfig`].
///
/// Callbacks run synchronously on the calling thread.
#[derive(Default)]
pub struct ComposeOptions<'a> {
    /// Channel layout.
    pub mode: Option<ChannelMode>,
    /// Output format.
    pub format: Option<OutputFormat>,
    /// JPEG quality in `1..=100`. `None` is adaptive.
    pub quality: Option<u8>,
    /// Progress hook.
    pub on_progress: Option<ProgressFn<'a>>,
    /// Cancellation hook.
    pub on_cancel: Option<CancelFn<'a>>,
    /// Post-compression for PNG output.
    pub png_optimizer: Option<Arc<dyn PngOptimizer>>,
}

impl std::fmt::Debug for ComposeOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposeOptions")
            .field("mode", &self.mode)
            .field("format", &self.format)
            .field("quality", &self.quality)
            .field("on_progress", &self.on_progress.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .field("png_optimizer", &self.png_optimizer.is_some())
            .finish()
    }
}

impl<'a> ComposeOptions<'a> {
    /// Options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel layout.
    pub fn mode(mut self, mode: ChannelMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set the output format.
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set an explicit JPEG quality.
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Install a progress hook.
    pub fn on_progress(mut self, f: impl FnMut(f64) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Install a cancellation hook.
    pub fn on_cancel(mut self, f: impl FnMut() -> bool + Send + 'a) -> Self {
        self.on_cancel = Some(Box::new(f));
        self
    }

    /// Install a PNG optimizer.
    pub fn png_optimizer(mut self, optimizer: Arc<dyn PngOptimizer>) -> Self {
        self.png_optimizer = Some(optimizer);
        self
    }

    pub(crate) fn cancelled(&mut self) -> bool {
        self.on_cancel.as_mut().is_some_and(|f| f())
    }
}

/// Reports progress through an optional hook, dropping values that would go backwards.
pub(crate) struct ProgressReporter<'o, 'a> {
    hook: Option<&'o mut ProgressFn<'a>>,
    total_units: usize,
    done_units: usize,
    last: Option<f64>,
}

impl<'o, 'a> ProgressReporter<'o, 'a> {
    pub(crate) fn new(hook: Option<&'o mut ProgressFn<'a>>, total_units: usize) -> Self {
        Self {
            hook,
            total_units: total_units.max(1),
            done_units: 0,
            last: None,
        }
    }

    pub(crate) fn advance(&mut self, units: usize) {
        if units == 0 {
            return;
        }
        self.done_units = (self.done_units + units).min(self.total_units);
        self.emit(self.done_units as f64 / self.total_units as f64);
    }

    /// Make sure the last reported value is exactly 1.0.
    pub(crate) fn finish(&mut self) {
        self.done_units = self.total_units;
        self.emit(1.0);
    }

    fn emit(&mut self, value: f64) {
        if self.last.is_some_and(|last| value <= last) {
            return;
        }
        self.last = Some(value);
        if let Some(hook) = self.hook.as_mut() {
            hook(value);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/options.rs"]
mod tests;
