use serde::Serialize;

/// Records completed so far out of the records in the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunProgress {
    current: usize,
    total: usize,
}

impl RunProgress {
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Count one more finished record. Never moves past `total`.
    pub fn advance(&mut self) {
        if self.current < self.total {
            self.current += 1;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
