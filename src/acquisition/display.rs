use crate::types::Frame;

/// Display slots, numbered as the operator's viewer windows are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplaySlot {
    /// The full frame as delivered
    FullFrame = 0,
    /// The cropped region of interest
    Region = 1,
}

/// Observational sink for frames. Never feeds back into measurements.
pub trait DisplaySink {
    fn show(&mut self, slot: DisplaySlot, image: &Frame);
}

/// Display sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDisplay;

impl DisplaySink for NoDisplay {
    fn show(&mut self, _slot: DisplaySlot, _image: &Frame) {}
}

impl<D: DisplaySink + ?Sized> DisplaySink for &mut D {
    fn show(&mut self, slot: DisplaySlot, image: &Frame) {
        (**self).show(slot, image)
    }
}
