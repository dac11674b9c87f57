use bitvec::prelude::*;
use drivers_shared::{
    ssd1306::{self, Screen, HEIGHT, NUM_PAGES, WIDTH},
    Error,
};

/// OLED panel. Drawing happens into the shared [`Screen`] layout, presenting copies the changed
/// pages into the panel memory the same way the I2C transfer would. With debug logging enabled
/// every presented frame is dumped as text.
pub struct Display {
    screen: Screen,
    panel: [u8; WIDTH * NUM_PAGES],
}

impl Default for Display {
    fn default() -> Self {
        Self {
            screen: Screen::default(),
            panel: [0; WIDTH * NUM_PAGES],
        }
    }
}

impl Display {
    fn present(&mut self) {
        let mut updated = false;
        for (page, values) in self.screen.buffer_mut().pages_for_update() {
            self.panel[page * WIDTH..][..WIDTH].copy_from_slice(values);
            updated = true;
        }
        if updated && log::log_enabled!(log::Level::Debug) {
            log::debug!("Display @{:#04x}:\n{}", ssd1306::I2C_ADDRESS, self.render());
        }
    }

    fn pixel(&self, row: usize, col: usize) -> bool {
        let page = &self.panel[(row / 8) * WIDTH..][..WIDTH];
        page[col].view_bits::<Lsb0>()[row % 8]
    }

    /// Two pixel rows per text line.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((WIDTH + 1) * HEIGHT / 2);
        for row in (0..HEIGHT).step_by(2) {
            for col in 0..WIDTH {
                out.push(match (self.pixel(row, col), self.pixel(row + 1, col)) {
                    (false, false) => ' ',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (true, true) => '█',
                });
            }
            out.push('\n');
        }
        out
    }
}

impl drivers_shared::display::Display for Display {
    fn show_heart_rate(&mut self, bpm: u16) -> Result<(), Error> {
        self.screen.draw_heart_rate(bpm);
        self.present();
        Ok(())
    }

    fn show_waveform(&mut self, samples: &[f32]) -> Result<(), Error> {
        self.screen.draw_waveform(samples);
        self.present();
        Ok(())
    }

    fn show_thresholds(&mut self, lower: u8, upper: u8) -> Result<(), Error> {
        self.screen.draw_thresholds(lower, upper);
        self.present();
        Ok(())
    }

    fn show_notification(&mut self, msg: &str) -> Result<(), Error> {
        if !msg.is_empty() {
            log::info!("Notification: {}", msg);
        }
        self.screen.draw_notification(msg);
        self.present();
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.screen.clear();
        self.present();
        Ok(())
    }
}
