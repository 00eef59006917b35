use crate::{
    snapshot::{Page, StationState},
    units,
};
use embedded_hal::blocking::i2c;
use ht16k33_7seg::SevenSegment;

/// Something that can show a single number.
pub trait SegmentDisplay {
    /// Renders `value`. Values that don't fit are shown with the display's own
    /// overflow indicator rather than failing.
    fn show(&mut self, value: f32) -> anyhow::Result<()>;
}

/// Alternates the two displays between two pages of the current snapshot.
#[derive(Debug)]
pub struct DisplayRotator<U, L> {
    upper: U,
    lower: L,
}

impl<U, L> DisplayRotator<U, L>
where
    U: SegmentDisplay,
    L: SegmentDisplay,
{
    pub fn new(upper: U, lower: L) -> Self {
        Self { upper, lower }
    }

    /// Shows the current page and moves on to the next one.
    ///
    /// A display that fails to update is logged and skipped; the page still
    /// advances so the next tick shows the other pair.
    pub fn render_tick(&mut self, state: &mut StationState) -> Page {
        let snapshot = *state.snapshot();
        log::info!("{snapshot}");

        let page = state.turn_page();
        let (upper, lower) = match page {
            Page::TemperaturePressure => (
                snapshot.temperature,
                units::hectopascals(snapshot.pressure),
            ),
            Page::HumidityAltitude => (snapshot.humidity, snapshot.altitude),
        };

        if let Err(error) = self.upper.show(upper) {
            log::warn!("failed to update upper display: {error:?}");
        }
        if let Err(error) = self.lower.show(lower) {
            log::warn!("failed to update lower display: {error:?}");
        }

        page
    }

    pub fn displays(&self) -> (&U, &L) {
        (&self.upper, &self.lower)
    }
}

impl<I, E> SegmentDisplay for SevenSegment<I>
where
    I: i2c::Write<Error = E>,
    E: std::fmt::Debug,
{
    fn show(&mut self, value: f32) -> anyhow::Result<()> {
        self.print_float(value)
            .map_err(|error| anyhow::anyhow!("error writing to HT16K33: {error:?}"))
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingDisplay {
        pub(crate) shown: Vec<f32>,
        pub(crate) fail: bool,
    }

    impl SegmentDisplay for RecordingDisplay {
        fn show(&mut self, value: f32) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("display unplugged");
            }
            self.shown.push(value);
            Ok(())
        }
    }
}
