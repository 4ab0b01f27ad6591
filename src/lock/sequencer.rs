/// Hands out strictly increasing request ids, starting at 1.
#[derive(Debug, Default)]
pub(crate) struct Sequencer {
    last: u64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// Restart from 1. Only valid when no request is outstanding.
    pub fn reset(&mut self) {
        self.last = 0;
    }
}
