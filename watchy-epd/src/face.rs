//! The watch face: battery voltage at the top, a grayscale test strip in the middle, and uptime
//! at the bottom.
//!
//! Only the parts that changed since the previous draw are redrawn, so that the canvas' dirty
//! area stays small.

use alloc::{format, string::String};
use core::time::Duration;

use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::{Gray8, GrayColor},
    prelude::{DrawTarget, Drawable, Point, Size},
    primitives::Rectangle,
    text::{Baseline, Text},
};

use crate::battery::Voltage;

/// Where the battery voltage is drawn. Fits six characters.
pub const BATTERY_AREA: Rectangle = Rectangle::new(Point::new(4, 10), Size::new(60, 20));
/// Where the uptime value is drawn. Fits hours up to three digits.
pub const UPTIME_AREA: Rectangle = Rectangle::new(Point::new(80, 170), Size::new(110, 20));
/// The horizontal black to white ramp.
pub const STRIP_AREA: Rectangle = Rectangle::new(Point::new(4, 60), Size::new(192, 40));
const UPTIME_LABEL_POSITION: Point = Point::new(4, 170);

/// Everything shown on the face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceState {
    pub battery: Voltage,
    pub uptime: Duration,
}

/// Formats an uptime as `HH:MM:SS`.
pub fn format_uptime(uptime: Duration) -> String {
    let seconds = uptime.as_secs();
    let minutes = seconds / 60;
    format!("{:02}:{:02}:{:02}", minutes / 60, minutes % 60, seconds % 60)
}

#[derive(Debug, Default)]
pub struct WatchFace {
    drawn: Option<FaceState>,
}

impl WatchFace {
    pub const fn new() -> Self {
        Self { drawn: None }
    }

    /// Makes the next draw start from a blank target, e.g. after it was resized.
    pub fn invalidate(&mut self) {
        self.drawn = None;
    }

    /// Draws `state`, skipping the parts that are already on `target`.
    pub fn draw<D>(&mut self, target: &mut D, state: FaceState) -> Result<(), D::Error>
    where
        D: DrawTarget,
        D::Color: From<Gray8>,
    {
        let previous = self.drawn;
        if previous.is_none() {
            target.clear(Gray8::WHITE.into())?;
            text(target, "Uptime", UPTIME_LABEL_POSITION)?;
            draw_strip(target)?;
        }

        if previous.map(|p| p.battery) != Some(state.battery) {
            let label = format!("{}", state.battery);
            target.fill_solid(&BATTERY_AREA, Gray8::WHITE.into())?;
            text(target, &label, BATTERY_AREA.top_left)?;
        }

        if previous.map(|p| p.uptime.as_secs()) != Some(state.uptime.as_secs()) {
            target.fill_solid(&UPTIME_AREA, Gray8::WHITE.into())?;
            text(target, &format_uptime(state.uptime), UPTIME_AREA.top_left)?;
        }

        self.drawn = Some(state);
        Ok(())
    }
}

fn text<D>(target: &mut D, text: &str, position: Point) -> Result<(), D::Error>
where
    D: DrawTarget,
    D::Color: From<Gray8>,
{
    let style = MonoTextStyle::new(&FONT_10X20, Gray8::BLACK.into());
    Text::with_baseline(text, position, style, Baseline::Top).draw(target)?;
    Ok(())
}

fn draw_strip<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget,
    D::Color: From<Gray8>,
{
    let width = STRIP_AREA.size.width;
    for column in 0..width {
        let luma = (column * 255 / (width - 1)) as u8;
        let line = Rectangle::new(
            STRIP_AREA.top_left + Point::new(column as i32, 0),
            Size::new(1, STRIP_AREA.size.height),
        );
        target.fill_solid(&line, Gray8::new(luma).into())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use embedded_graphics::primitives::PointsIter;

    use super::*;
    use crate::canvas::Canvas;

    const PANEL: Size = Size::new(200, 200);

    fn state(millivolts: u32, seconds: u64) -> FaceState {
        FaceState {
            battery: Voltage::from_millivolts(millivolts),
            uptime: Duration::from_secs(seconds),
        }
    }

    fn drawn_canvas(face: &mut WatchFace, state: FaceState) -> Canvas<Gray8> {
        let mut canvas = Canvas::new(PANEL, Gray8::WHITE).unwrap();
        face.draw(&mut canvas, state).unwrap();
        let region = canvas.take_dirty().unwrap();
        assert_eq!(region.area().size, PANEL);
        canvas
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_uptime(Duration::from_millis(3_661_900)), "01:01:01");
        assert_eq!(format_uptime(Duration::from_secs(100 * 3600 + 59)), "100:00:59");
    }

    #[test]
    fn test_first_draw_covers_everything() {
        let mut face = WatchFace::new();
        let canvas = drawn_canvas(&mut face, state(4120, 5));

        // The strip runs from black to white.
        assert_eq!(canvas.sample(STRIP_AREA.top_left), Some(0));
        assert_eq!(
            canvas.sample(STRIP_AREA.top_left + Point::new(191, 39)),
            Some(255)
        );
        // Some text was drawn in black.
        let has_black = BATTERY_AREA
            .points()
            .any(|p| canvas.sample(p) == Some(0));
        assert!(has_black);
    }

    #[test]
    fn test_unchanged_state_draws_nothing() {
        let mut face = WatchFace::new();
        let mut canvas = drawn_canvas(&mut face, state(4120, 5));

        // Sub-second changes don't show.
        face.draw(&mut canvas, FaceState { uptime: Duration::from_millis(5_900), ..state(4120, 5) })
            .unwrap();
        assert!(canvas.take_dirty().is_none());
    }

    #[test]
    fn test_only_changed_parts_are_redrawn() {
        let mut face = WatchFace::new();
        let mut canvas = drawn_canvas(&mut face, state(4120, 5));

        face.draw(&mut canvas, state(4120, 6)).unwrap();
        assert_eq!(canvas.take_dirty().unwrap().area(), UPTIME_AREA);

        face.draw(&mut canvas, state(4050, 6)).unwrap();
        assert_eq!(canvas.take_dirty().unwrap().area(), BATTERY_AREA);
    }

    #[test]
    fn test_invalidate_redraws_everything() {
        let mut face = WatchFace::new();
        let mut canvas = drawn_canvas(&mut face, state(4120, 5));

        face.invalidate();
        face.draw(&mut canvas, state(4120, 5)).unwrap();
        assert_eq!(canvas.take_dirty().unwrap().area().size, PANEL);
    }
}
