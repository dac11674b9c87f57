use core::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ButtonEvent {
    Wake,
    Sleep,
    Record,
}

pub const SINGLE_CLICK_TIME: Duration = Duration::from_millis(500);
pub const HOLD_TIME: Duration = Duration::from_millis(3000);

/// Turns debounced press durations into device events.
///
/// A short click requests a record. Holding the button toggles between sleeping and awake, so
/// the same hold produces `Sleep` or `Wake` depending on what came before. Presses between the
/// click and hold times are ignored.
pub struct PressClassifier {
    asleep: bool,
}

impl Default for PressClassifier {
    fn default() -> Self {
        Self { asleep: false }
    }
}

impl PressClassifier {
    pub fn classify(&mut self, press: Duration) -> Option<ButtonEvent> {
        if press >= HOLD_TIME {
            self.asleep = !self.asleep;
            Some(if self.asleep {
                ButtonEvent::Sleep
            } else {
                ButtonEvent::Wake
            })
        } else if press < SINGLE_CLICK_TIME && !self.asleep {
            Some(ButtonEvent::Record)
        } else {
            None
        }
    }
}
