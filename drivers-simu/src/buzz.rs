pub use drivers_shared::buzz::*;
use drivers_shared::Error;

#[derive(Default)]
pub struct Buzzer {
    active: Option<Pattern>,
}

impl Buzzer {
    pub fn active(&self) -> Option<Pattern> {
        self.active
    }
}

impl drivers_shared::buzz::Buzzer for Buzzer {
    fn enable(&mut self, pattern: Pattern) -> Result<(), Error> {
        self.active = Some(pattern);
        send_cmd(BuzzCmd::Pattern(pattern));
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Error> {
        if self.active.take().is_some() {
            send_cmd(BuzzCmd::Off);
        }
        Ok(())
    }
}

fn send_cmd(cmd: BuzzCmd) {
    println!("Buzz: {:?}", cmd);
}
