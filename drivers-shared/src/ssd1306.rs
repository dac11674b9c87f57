use arrform::{arrform, ArrForm};
use bitvec::prelude::*;
use embedded_graphics::{
    mono_font::{ascii::FONT_5X8, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Polyline, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

pub const WIDTH: usize = 128;
pub const HEIGHT: usize = 64;
pub const NUM_PAGES: usize = HEIGHT / 8;
pub const I2C_ADDRESS: u8 = 0x3c;

const HEART_RATE_AREA: Rectangle = Rectangle::new(Point::new(0, 0), Size::new(80, 9));
const THRESHOLD_AREA: Rectangle = Rectangle::new(Point::new(80, 0), Size::new(48, 9));
const WAVE_FRAME: Rectangle = Rectangle::new(Point::new(0, 9), Size::new(WIDTH as _, 46));
const WAVE_AREA: Rectangle = Rectangle::new(Point::new(1, 10), Size::new(WIDTH as u32 - 2, 44));
const NOTIFICATION_AREA: Rectangle = Rectangle::new(Point::new(0, 56), Size::new(WIDTH as _, 8));

const WAVE_POINTS: usize = WIDTH - 2;

/// Frame buffer in the controller's page layout: every byte covers eight vertically stacked
/// pixels, one page is a full row of such bytes.
pub struct Buffer {
    values: [u8; WIDTH * NUM_PAGES],
    changed: BitArray<[u8; 1]>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            values: [0; WIDTH * NUM_PAGES],
            changed: BitArray::default(),
        }
    }
}

impl Buffer {
    pub fn set(&mut self, row: i32, col: i32, on: bool) {
        if row < 0 || col < 0 {
            return;
        }
        let row = row as usize;
        let col = col as usize;
        if row >= HEIGHT || col >= WIDTH {
            return;
        }

        let page = row / 8;
        self.changed.set(page, true);

        let bit = 1 << (row % 8);
        let v = &mut self.values[page * WIDTH + col];
        if on {
            *v |= bit;
        } else {
            *v &= !bit;
        }
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        if row >= HEIGHT || col >= WIDTH {
            return false;
        }
        self.values[(row / 8) * WIDTH + col] & (1 << (row % 8)) != 0
    }

    pub fn fill(&mut self, on: bool) {
        self.values.fill(if on { 0xff } else { 0 });
        self.changed.fill(true);
    }

    /// Pages modified since the last call, each with its page index.
    pub fn pages_for_update<'a>(&'a mut self) -> impl Iterator<Item = (usize, &'a [u8])> + 'a {
        let values = &self.values;
        let changed = &mut self.changed;

        (0..NUM_PAGES).filter_map(move |page| {
            if changed[page] {
                changed.set(page, false);
                Some((page, &values[page * WIDTH..(page + 1) * WIDTH]))
            } else {
                None
            }
        })
    }
}

impl OriginDimensions for Buffer {
    fn size(&self) -> Size {
        Size {
            width: WIDTH as _,
            height: HEIGHT as _,
        }
    }
}

impl DrawTarget for Buffer {
    type Color = BinaryColor;

    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(pos, color) in pixels {
            self.set(pos.y, pos.x, color.is_on());
        }
        Ok(())
    }
}

/// Screen layout of the device: heart rate and thresholds in the top bar, the pulse waveform in
/// a frame below and a single notification line at the bottom.
#[derive(Default)]
pub struct Screen {
    buffer: Buffer,
}

impl Screen {
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    fn draw<D: Drawable<Color = BinaryColor>>(&mut self, d: &D) {
        match d.draw(&mut self.buffer) {
            Ok(_) => {}
            Err(e) => match e {},
        }
    }

    fn text(&mut self, text: &str, pos: Point, alignment: Alignment) {
        let character_style = MonoTextStyle::new(&FONT_5X8, BinaryColor::On);
        let text_style = TextStyleBuilder::new()
            .alignment(alignment)
            .baseline(Baseline::Top)
            .build();
        self.draw(&Text::with_text_style(
            text,
            pos,
            character_style,
            text_style,
        ));
    }

    fn blank(&mut self, area: &Rectangle) {
        self.draw(&area.into_styled(PrimitiveStyle::with_fill(BinaryColor::Off)));
    }

    pub fn draw_heart_rate(&mut self, bpm: u16) {
        self.blank(&HEART_RATE_AREA);
        let s: ArrForm<16> = if bpm == 0 {
            arrform!(16, "HR --- bpm")
        } else {
            arrform!(16, "HR {:>3} bpm", bpm)
        };
        self.text(s.as_str(), Point::new(0, 0), Alignment::Left);
    }

    pub fn draw_thresholds(&mut self, lower: u8, upper: u8) {
        self.blank(&THRESHOLD_AREA);
        let s = arrform!(8, "{}-{}", lower, upper);
        self.text(s.as_str(), Point::new(WIDTH as i32 - 1, 0), Alignment::Right);
    }

    pub fn draw_waveform(&mut self, samples: &[f32]) {
        self.draw(&WAVE_FRAME.into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1)));
        self.blank(&WAVE_AREA);
        if samples.is_empty() {
            return;
        }

        let (min, max) = samples
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let range = max - min;
        let top = WAVE_AREA.top_left.y;
        let height = WAVE_AREA.size.height as i32 - 1;

        let points: [Point; WAVE_POINTS] = core::array::from_fn(|i| {
            let v = samples[i * samples.len() / WAVE_POINTS];
            let y = if range > 0.0 {
                top + height - ((v - min) / range * height as f32) as i32
            } else {
                top + height / 2
            };
            Point::new(WAVE_AREA.top_left.x + i as i32, y)
        });
        let style = PrimitiveStyle::with_stroke(BinaryColor::On, 1);
        self.draw(&Polyline::new(&points).into_styled(style));
    }

    pub fn draw_notification(&mut self, msg: &str) {
        self.blank(&NOTIFICATION_AREA);
        self.text(msg, Point::new(WIDTH as i32 / 2, 56), Alignment::Center);
    }

    pub fn clear(&mut self) {
        self.buffer.fill(false);
    }
}
