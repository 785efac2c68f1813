use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Number of frames the rolling cost window covers.
pub const FRAME_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileEntry {
    pub symbol: usize,
    pub average: Duration,
}

/// Accumulates per-function-symbol execution cost over a rolling window of
/// frames. Purely diagnostic: the bridge works identically with this
/// disabled, which it is by default.
#[derive(Debug)]
pub struct CallProfiler {
    frames: [HashMap<usize, Duration>; FRAME_WINDOW],
    start_stack: Vec<Instant>,
    frame_index: usize,
}

impl CallProfiler {
    pub fn new() -> Self {
        Self {
            frames: std::array::from_fn(|_| HashMap::new()),
            start_stack: Vec::new(),
            frame_index: 0,
        }
    }

    /// Bracket open. Nested brackets are fine; starts stack LIFO with ends.
    pub fn begin_call(&mut self) {
        self.start_stack.push(Instant::now());
    }

    /// Bracket close, attributing the elapsed time to `symbol` in the
    /// current frame bucket.
    pub fn end_call(&mut self, symbol: usize) {
        if let Some(start) = self.start_stack.pop() {
            *self.frames[self.frame_index].entry(symbol).or_default() += start.elapsed();
        }
    }

    /// Advance the ring to the next frame and clear its stale bucket.
    pub fn on_frame_start(&mut self) {
        self.frame_index = (self.frame_index + 1) % FRAME_WINDOW;
        self.frames[self.frame_index].clear();
    }

    pub fn reset(&mut self) {
        self.start_stack.clear();
        for frame in &mut self.frames {
            frame.clear();
        }
    }

    /// Top-N most expensive symbols, averaged over the whole window,
    /// descending.
    pub fn report(&self, top_n: usize) -> Vec<ProfileEntry> {
        let mut combined: HashMap<usize, Duration> = HashMap::new();
        for frame in &self.frames {
            for (&symbol, &cost) in frame {
                *combined.entry(symbol).or_default() += cost;
            }
        }
        let mut entries: Vec<ProfileEntry> = combined
            .into_iter()
            .map(|(symbol, total)| ProfileEntry { symbol, average: total / FRAME_WINDOW as u32 })
            .collect();
        entries.sort_by(|a, b| b.average.cmp(&a.average).then(a.symbol.cmp(&b.symbol)));
        entries.truncate(top_n);
        entries
    }
}

impl Default for CallProfiler {
    fn default() -> Self {
        Self::new()
    }
}
