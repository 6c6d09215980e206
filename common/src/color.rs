pub const COLOR_MASK: u32 = 0x00FF_FFFF;
pub const CHANNEL_MIN: u8 = 0;
pub const CHANNEL_MAX: u8 = 0xFF;

// Channel brightness levels used by the light shows
pub const BRIGHT_OFF: u8 = 0;
pub const BRIGHT_LOW: u8 = 0x20;
pub const BRIGHT_MED: u8 = 0x40;
pub const BRIGHT_HIGH: u8 = 0x80;
pub const BRIGHT_MAX: u8 = 0xFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    const fn shift(self) -> u32 {
        match self {
            Channel::Red => 16,
            Channel::Green => 8,
            Channel::Blue => 0,
        }
    }
}

/// A 24 bit color, red in the high byte and blue in the low byte.
///
/// The stored value never has bits set above bit 23, whatever was passed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const BLACK: Color = Color(0x000000);
    pub const RED: Color = Color(0x200000);
    pub const GREEN: Color = Color(0x002000);
    pub const BLUE: Color = Color(0x000020);
    pub const WHITE: Color = Color(0x202020);

    pub const fn new(packed: u32) -> Self {
        Self(packed & COLOR_MASK)
    }

    pub const fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Self(((red as u32) << 16) | ((green as u32) << 8) | blue as u32)
    }

    pub const fn packed(self) -> u32 {
        self.0
    }

    pub const fn channel(self, which: Channel) -> u8 {
        ((self.0 >> which.shift()) & CHANNEL_MAX as u32) as u8
    }

    pub const fn red(self) -> u8 {
        self.channel(Channel::Red)
    }

    pub const fn green(self) -> u8 {
        self.channel(Channel::Green)
    }

    pub const fn blue(self) -> u8 {
        self.channel(Channel::Blue)
    }

    /// Replaces one channel. Only the low 8 bits of `value` are used.
    pub const fn with_channel(self, which: Channel, value: u32) -> Self {
        let shift = which.shift();
        let cleared = self.0 & !((CHANNEL_MAX as u32) << shift);
        Self(cleared | ((value & CHANNEL_MAX as u32) << shift))
    }

    /// Moves one channel by `delta`. If the result would leave `0..=255` the color is
    /// returned untouched, so a fade stepping by 0x20 stops exactly on its last step
    /// instead of being clamped to a value it never reached.
    pub fn adjust_channel(self, which: Channel, delta: i32) -> Self {
        let current = i32::from(self.channel(which));
        match current.checked_add(delta) {
            Some(next) if (i32::from(CHANNEL_MIN)..=i32::from(CHANNEL_MAX)).contains(&next) => {
                self.with_channel(which, next as u32)
            }
            _ => self,
        }
    }

    pub fn set_channel(&mut self, which: Channel, value: u32) {
        *self = self.with_channel(which, value);
    }

    pub fn modify_channel(&mut self, which: Channel, delta: i32) {
        *self = self.adjust_channel(which, delta);
    }
}

impl From<u32> for Color {
    fn from(packed: u32) -> Self {
        Self::new(packed)
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        color.packed()
    }
}
