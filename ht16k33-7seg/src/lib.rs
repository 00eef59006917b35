// Layout and command set follow the Adafruit LED backpack library:
// https://github.com/adafruit/Adafruit_LED_Backpack/blob/master/Adafruit_LEDBackpack.cpp
// and the HT16K33 datasheet:
// https://cdn-shop.adafruit.com/datasheets/ht16K33v110.pdf
use core::fmt::{self, Write as _};
use embedded_hal::blocking::i2c;

/// Number of glyph positions on the backpack, including the colon.
pub const POSITIONS: usize = 5;

/// The colon sits between the second and third digit.
const COLON: usize = 2;

const DOT: u8 = 0x80;
const MINUS: u8 = 0x40;

/// Segment patterns for the hex digits `0`..=`f`.
const FONT: [u8; 16] = [
    0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F, 0x77, 0x7C, 0x39, 0x5E, 0x79, 0x71,
];

mod cmd {
    pub(super) const DISPLAY_RAM: u8 = 0x00;
    pub(super) const OSCILLATOR_ON: u8 = 0x21;
    pub(super) const DISPLAY_ON: u8 = 0x81;
    pub(super) const BRIGHTNESS: u8 = 0xE0;
}

pub const MAX_BRIGHTNESS: u8 = 15;

/// The segment bitmasks for all five positions of a 4-digit backpack.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Glyphs([u8; POSITIONS]);

#[derive(Debug)]
pub struct SevenSegment<I> {
    i2c: I,
    addr: u8,
    glyphs: Glyphs,
}

#[derive(Debug)]
pub enum Error<E> {
    I2c(E),
}

// === impl Glyphs ===

impl Glyphs {
    pub const BLANK: Self = Self([0; POSITIONS]);

    /// Dashes on every digit; the backpack's "doesn't fit" indicator.
    pub const OVERFLOW: Self = Self([MINUS, MINUS, 0, MINUS, MINUS]);

    /// Lays out `value` right-aligned with up to `frac_digits` decimals.
    ///
    /// Fractional digits are dropped one at a time until the number fits into
    /// the four digits (three if a minus sign is needed). Values that still
    /// don't fit, and non-finite values, render as [`Glyphs::OVERFLOW`].
    pub fn from_float(value: f32, frac_digits: u8) -> Self {
        if !value.is_finite() {
            return Self::OVERFLOW;
        }

        let mut n = f64::from(value);
        let negative = n < 0.0;
        let mut numeric_digits: u32 = 4;
        if negative {
            numeric_digits -= 1;
            n = -n;
        }

        let too_big = 10u64.pow(numeric_digits);
        // at least one digit has to be left for the integer part
        let mut frac = i32::from(frac_digits).min(numeric_digits as i32 - 1);
        let mut factor = 10f64.powi(frac);
        let mut number = (n * factor + 0.5) as u64;
        while number >= too_big {
            frac -= 1;
            factor /= 10.0;
            number = (n * factor + 0.5) as u64;
        }

        if frac < 0 {
            // the decimal point would have to move off the display
            return Self::OVERFLOW;
        }

        let mut glyphs = [0u8; POSITIONS];
        let mut pos = POSITIONS as isize - 1;
        let mut i = 0;
        while number != 0 || i <= frac {
            let dot = if frac != 0 && i == frac { DOT } else { 0 };
            glyphs[pos as usize] = FONT[(number % 10) as usize] | dot;
            pos -= 1;
            if pos == COLON as isize {
                glyphs[COLON] = 0;
                pos -= 1;
            }
            number /= 10;
            i += 1;
        }

        if negative {
            glyphs[pos as usize] = MINUS;
        }

        Self(glyphs)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; POSITIONS] {
        &self.0
    }
}

impl fmt::Display for Glyphs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pos, &glyph) in self.0.iter().enumerate() {
            if pos == COLON {
                continue;
            }

            let ch = match glyph & !DOT {
                0 => ' ',
                MINUS => '-',
                segments => FONT
                    .iter()
                    .position(|&pattern| pattern == segments)
                    .and_then(|digit| char::from_digit(digit as u32, 16))
                    .unwrap_or('?'),
            };
            f.write_char(ch)?;
            if glyph & DOT != 0 {
                f.write_char('.')?;
            }
        }
        Ok(())
    }
}

// === impl SevenSegment ===

impl<I, E> SevenSegment<I>
where
    I: i2c::Write<Error = E>,
{
    /// Adafruit backpacks default to address 0x70; the A0-A2 jumpers select
    /// 0x71 through 0x77.
    pub fn new(i2c: I, addr: u8) -> Self {
        Self {
            i2c,
            addr,
            glyphs: Glyphs::BLANK,
        }
    }

    /// Starts the oscillator, turns the display on without blinking, sets the
    /// brightness and clears whatever the RAM held at power-up.
    pub fn init(&mut self, brightness: u8) -> Result<(), Error<E>> {
        self.command(cmd::OSCILLATOR_ON)?;
        self.command(cmd::DISPLAY_ON)?;
        self.set_brightness(brightness)?;
        self.glyphs = Glyphs::BLANK;
        self.write_display()
    }

    /// Brightness is clamped to 0..=15.
    pub fn set_brightness(&mut self, brightness: u8) -> Result<(), Error<E>> {
        self.command(cmd::BRIGHTNESS | brightness.min(MAX_BRIGHTNESS))
    }

    /// Lays out `value` with two decimals and pushes it to the display.
    pub fn print_float(&mut self, value: f32) -> Result<(), Error<E>> {
        self.glyphs = Glyphs::from_float(value, 2);
        self.write_display()
    }

    pub fn set_glyphs(&mut self, glyphs: Glyphs) {
        self.glyphs = glyphs;
    }

    #[must_use]
    pub fn glyphs(&self) -> &Glyphs {
        &self.glyphs
    }

    /// Writes the whole 16-byte display RAM, starting at row 0.
    pub fn write_display(&mut self) -> Result<(), Error<E>> {
        let mut buf = [0u8; 17];
        buf[0] = cmd::DISPLAY_RAM;
        for (row, &glyph) in self.glyphs.as_bytes().iter().enumerate() {
            // each row is a little-endian u16; the digits only use the low byte
            buf[1 + row * 2] = glyph;
        }
        self.i2c.write(self.addr, &buf).map_err(Error::I2c)
    }

    pub fn release(self) -> I {
        self.i2c
    }

    fn command(&mut self, cmd: u8) -> Result<(), Error<E>> {
        self.i2c.write(self.addr, &[cmd]).map_err(Error::I2c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockI2c {
        writes: Vec<(u8, Vec<u8>)>,
        fail: bool,
    }

    impl i2c::Write for MockI2c {
        type Error = ();

        fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.writes.push((addr, bytes.to_vec()));
            Ok(())
        }
    }

    fn render(value: f32) -> String {
        Glyphs::from_float(value, 2).to_string()
    }

    #[test]
    fn two_decimals_when_they_fit() {
        assert_eq!(render(21.5), "21.50");
        assert_eq!(render(45.2), "45.20");
        assert_eq!(render(0.0), " 0.00");
    }

    #[test]
    fn drops_decimals_to_fit() {
        assert_eq!(render(112.0), "112.0");
        assert_eq!(render(1013.25), "1013");
        assert_eq!(render(9999.0), "9999");
    }

    #[test]
    fn negative_values_reserve_a_digit() {
        assert_eq!(render(-5.25), "-5.25");
        assert_eq!(render(-12.5), "-12.5");
        assert_eq!(render(-999.0), "-999");
    }

    #[test]
    fn too_large_is_dashed() {
        assert_eq!(Glyphs::from_float(10000.0, 2), Glyphs::OVERFLOW);
        assert_eq!(Glyphs::from_float(-1000.0, 2), Glyphs::OVERFLOW);
        assert_eq!(Glyphs::from_float(f32::NAN, 2), Glyphs::OVERFLOW);
        assert_eq!(Glyphs::from_float(f32::INFINITY, 2), Glyphs::OVERFLOW);
        assert_eq!(Glyphs::OVERFLOW.to_string(), "----");
    }

    #[test]
    fn excess_decimals_are_capped() {
        assert_eq!(Glyphs::from_float(1.0, 9).to_string(), "1.000");
        assert_eq!(Glyphs::from_float(-1.0, 9).to_string(), "-1.00");
    }

    #[test]
    fn colon_stays_dark() {
        for value in [0.0, 12.34, -1.5, 1013.25, 99999.0] {
            assert_eq!(Glyphs::from_float(value, 2).as_bytes()[COLON], 0, "{value}");
        }
    }

    #[test]
    fn init_sequence() {
        let mut display = SevenSegment::new(MockI2c::default(), 0x71);
        display.init(1).unwrap();
        let i2c = display.release();
        let cmds: Vec<_> = i2c.writes.iter().take(3).map(|(_, bytes)| bytes.clone()).collect();
        assert_eq!(cmds, vec![vec![0x21], vec![0x81], vec![0xE1]]);
        assert!(i2c.writes.iter().all(|(addr, _)| *addr == 0x71));
        let (_, ram) = i2c.writes.last().unwrap();
        assert_eq!(ram.len(), 17);
        assert!(ram.iter().all(|&b| b == 0));
    }

    #[test]
    fn brightness_is_clamped() {
        let mut display = SevenSegment::new(MockI2c::default(), 0x70);
        display.set_brightness(200).unwrap();
        assert_eq!(display.release().writes[0].1, vec![0xEF]);
    }

    #[test]
    fn print_float_writes_ram() {
        let mut display = SevenSegment::new(MockI2c::default(), 0x70);
        display.print_float(21.5).unwrap();
        assert_eq!(display.glyphs().to_string(), "21.50");
        let (_, ram) = &display.release().writes[0];
        assert_eq!(ram[0], 0x00);
        // digit rows land in the low bytes of rows 0..5
        assert_eq!(ram[1], FONT[2]);
        assert_eq!(ram[3], FONT[1] | DOT);
        assert_eq!(ram[5], 0);
        assert_eq!(ram[7], FONT[5]);
        assert_eq!(ram[9], FONT[0]);
        assert!(ram[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn set_glyphs_waits_for_write_display() {
        let mut display = SevenSegment::new(MockI2c::default(), 0x70);
        display.set_glyphs(Glyphs::OVERFLOW);
        assert_eq!(display.glyphs(), &Glyphs::OVERFLOW);
        display.write_display().unwrap();
        let writes = display.release().writes;
        assert_eq!(writes.len(), 1);
        let (_, ram) = &writes[0];
        assert_eq!(ram[1], MINUS);
        assert_eq!(ram[3], MINUS);
        assert_eq!(ram[5], 0);
        assert_eq!(ram[7], MINUS);
        assert_eq!(ram[9], MINUS);
    }

    #[test]
    fn bus_errors_are_returned() {
        let mut display = SevenSegment::new(
            MockI2c {
                fail: true,
                ..Default::default()
            },
            0x70,
        );
        assert!(matches!(display.print_float(1.0), Err(Error::I2c(()))));
    }
}
