//! Air-quality dashboard.
//!
//! [`Dashboard`] draws onto any 320×240 `Rgb565` [`DrawTarget`]: a header
//! panel in the AQI alert colour holding the index text, and a body panel
//! in the matching background colour holding the individual readings.
//! [`LogDisplay`] stands in where no panel driver is wired up.

use embedded_graphics::mono_font::iso_8859_1::FONT_10X20;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::{Rgb565, Rgb888};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};

use crate::ports::{Display, Label, Panel};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const HEADER_HEIGHT: u32 = 64;

const LABEL_COUNT: usize = 7;

const CAPTIONS: [(&str, i32); 3] = [("PM1.0", 8), ("PM2.5", 112), ("PM10", 216)];
const CAPTION_Y: i32 = 176;

fn panel_area(panel: Panel) -> Rectangle {
    match panel {
        Panel::Aqi => Rectangle::new(Point::zero(), Size::new(WIDTH, HEADER_HEIGHT)),
        Panel::Body => Rectangle::new(
            Point::new(0, HEADER_HEIGHT as i32),
            Size::new(WIDTH, HEIGHT - HEADER_HEIGHT),
        ),
    }
}

/// Where each label lives; the slot is cleared before every redraw.
fn slot(label: Label) -> (Panel, Rectangle) {
    let at = |x, y, w, h| Rectangle::new(Point::new(x, y), Size::new(w, h));
    match label {
        Label::Aqi => (Panel::Aqi, at(8, 8, 304, 48)),
        Label::Temperature => (Panel::Body, at(8, 76, 150, 24)),
        Label::Humidity => (Panel::Body, at(168, 76, 144, 24)),
        Label::Pressure => (Panel::Body, at(8, 110, 150, 24)),
        Label::Pm1_0 => (Panel::Body, at(8, 200, 96, 24)),
        Label::Pm2_5 => (Panel::Body, at(112, 200, 96, 24)),
        Label::Pm10 => (Panel::Body, at(216, 200, 96, 24)),
    }
}

const ALL_LABELS: [Label; LABEL_COUNT] = [
    Label::Aqi,
    Label::Temperature,
    Label::Humidity,
    Label::Pressure,
    Label::Pm1_0,
    Label::Pm2_5,
    Label::Pm10,
];

/// Dark text on light panels, white on dark ones (maroon, purple).
fn text_color(background: Rgb888) -> Rgb565 {
    let luma = 299 * u32::from(background.r())
        + 587 * u32::from(background.g())
        + 114 * u32::from(background.b());
    if luma < 128_000 {
        Rgb565::WHITE
    } else {
        Rgb565::BLACK
    }
}

/// Dashboard renderer for any `Rgb565` draw target.
///
/// Library-only for now: the firmware binary has no panel driver for the
/// Core2 LCD and uses [`LogDisplay`] on both the device and the host.
pub struct Dashboard<D> {
    target: D,
    texts: [String; LABEL_COUNT],
    aqi_color: Rgb888,
    body_color: Rgb888,
}

impl<D> Dashboard<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: core::fmt::Debug,
{
    pub fn new(target: D) -> Self {
        Self {
            target,
            texts: Default::default(),
            aqi_color: Rgb888::new(0, 128, 0),
            body_color: Rgb888::new(123, 224, 123),
        }
    }

    pub fn target(&self) -> &D {
        &self.target
    }

    /// Paint both panels from scratch.
    pub fn init(&mut self) -> anyhow::Result<()> {
        self.redraw_panel(Panel::Aqi)?;
        self.redraw_panel(Panel::Body)
    }

    fn panel_color(&self, panel: Panel) -> Rgb888 {
        match panel {
            Panel::Aqi => self.aqi_color,
            Panel::Body => self.body_color,
        }
    }

    fn redraw_panel(&mut self, panel: Panel) -> anyhow::Result<()> {
        let bg = self.panel_color(panel);
        panel_area(panel)
            .into_styled(PrimitiveStyle::with_fill(Rgb565::from(bg)))
            .draw(&mut self.target)
            .map_err(draw_error)?;

        if panel == Panel::Body {
            let style = MonoTextStyle::new(&FONT_10X20, text_color(bg));
            for (caption, x) in CAPTIONS {
                Text::with_baseline(caption, Point::new(x, CAPTION_Y), style, Baseline::Top)
                    .draw(&mut self.target)
                    .map_err(draw_error)?;
            }
        }

        for label in ALL_LABELS {
            if slot(label).0 == panel {
                self.redraw_label(label)?;
            }
        }
        Ok(())
    }

    fn redraw_label(&mut self, label: Label) -> anyhow::Result<()> {
        let (panel, area) = slot(label);
        let bg = self.panel_color(panel);

        area.into_styled(PrimitiveStyle::with_fill(Rgb565::from(bg)))
            .draw(&mut self.target)
            .map_err(draw_error)?;

        let style = MonoTextStyle::new(&FONT_10X20, text_color(bg));
        Text::with_baseline(&self.texts[label as usize], area.top_left, style, Baseline::Top)
            .draw(&mut self.target)
            .map_err(draw_error)?;
        Ok(())
    }
}

fn draw_error<E: core::fmt::Debug>(e: E) -> anyhow::Error {
    anyhow::anyhow!("display draw failed: {:?}", e)
}

impl<D> Display for Dashboard<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: core::fmt::Debug,
{
    fn set_label(&mut self, label: Label, text: &str) -> anyhow::Result<()> {
        let current = &mut self.texts[label as usize];
        if current.as_str() == text {
            return Ok(());
        }
        current.clear();
        current.push_str(text);
        self.redraw_label(label)
    }

    fn set_panel_color(&mut self, panel: Panel, color: Rgb888) -> anyhow::Result<()> {
        if self.panel_color(panel) == color {
            return Ok(());
        }
        match panel {
            Panel::Aqi => self.aqi_color = color,
            Panel::Body => self.body_color = color,
        }
        self.redraw_panel(panel)
    }
}

/// Logs label changes instead of drawing them.
#[derive(Debug, Default)]
pub struct LogDisplay {
    texts: [String; LABEL_COUNT],
}

impl Display for LogDisplay {
    fn set_label(&mut self, label: Label, text: &str) -> anyhow::Result<()> {
        let current = &mut self.texts[label as usize];
        if current.as_str() != text {
            log::info!("[display] {:?}: {}", label, text.replace('\n', " / "));
            current.clear();
            current.push_str(text);
        }
        Ok(())
    }

    fn set_panel_color(&mut self, panel: Panel, color: Rgb888) -> anyhow::Result<()> {
        log::debug!(
            "[display] {:?} panel #{:02x}{:02x}{:02x}",
            panel,
            color.r(),
            color.g(),
            color.b()
        );
        Ok(())
    }
}
