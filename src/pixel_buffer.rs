use common::color::Color;
use common::comm_messages::MAX_PIXELS;

/// A color bound to its position on the strip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexedPixel {
    pub index: usize,
    pub color: Color,
}

// Current colors plus the colors the device is known to be showing. `sent` is only
// written by `commit`, which the session calls once a flush went through.
pub struct PixelBuffer {
    current: [Color; MAX_PIXELS],
    sent: [Color; MAX_PIXELS],
    active_length: usize,
}

impl PixelBuffer {
    /// `active_length` is clamped to the device maximum.
    pub fn new(active_length: usize) -> Self {
        Self {
            current: [Color::BLACK; MAX_PIXELS],
            sent: [Color::BLACK; MAX_PIXELS],
            active_length: active_length.min(MAX_PIXELS),
        }
    }

    pub fn active_length(&self) -> usize {
        self.active_length
    }

    pub fn get(&self, index: usize) -> Option<Color> {
        self.current[..self.active_length].get(index).copied()
    }

    /// Writes past the active length are ignored.
    pub fn set(&mut self, index: usize, color: Color) {
        if let Some(slot) = self.current[..self.active_length].get_mut(index) {
            *slot = color;
        }
    }

    pub fn set_all(&mut self, color: Color) {
        self.current[..self.active_length].fill(color);
    }

    /// Every pixel that differs from what was last committed, lowest index first.
    pub fn diff(&self) -> Vec<IndexedPixel> {
        self.current[..self.active_length]
            .iter()
            .zip(&self.sent[..self.active_length])
            .enumerate()
            .filter(|(_, (current, sent))| current != sent)
            .map(|(index, (&color, _))| IndexedPixel { index, color })
            .collect()
    }

    pub fn commit(&mut self, flushed: &[IndexedPixel]) {
        for pixel in flushed {
            if let Some(slot) = self.sent.get_mut(pixel.index) {
                *slot = pixel.color;
            }
        }
    }

    /// Treats every pixel as showing `color` already, as after the device's INIT.
    pub(crate) fn reset_baseline(&mut self, color: Color) {
        self.current.fill(color);
        self.sent.fill(color);
    }
}
