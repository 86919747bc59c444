/// source of sequence numbers for outbound requests
pub trait Sequence {
    fn next_sequence(&mut self) -> u32;
}

/// random sequence numbers, so answers to a previous session are unlikely to be taken for ours
#[derive(Copy, Clone, Debug, Default)]
pub struct RandomSequence;
impl Sequence for RandomSequence {
    fn next_sequence(&mut self) -> u32 {
        rand::random()
    }
}

/// consecutive sequence numbers from a given start, for reproducible exchanges
#[derive(Copy, Clone, Debug, Default)]
pub struct CountingSequence {
    next: u32,
}
impl CountingSequence {
    pub fn new(start: u32) -> Self {
        Self {next: start}
    }
}
impl Sequence for CountingSequence {
    fn next_sequence(&mut self) -> u32 {
        let current = self.next;
        self.next = current.wrapping_add(1);
        current
    }
}
