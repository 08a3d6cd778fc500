// src/core/buffer.rs

/// A fixed-capacity ring of lines. Pushing beyond capacity overwrites the
/// oldest slot; reads return the retained lines oldest-first.
#[derive(Debug, Clone)]
pub struct CircularBuffer {
    slots: Vec<String>,
    capacity: usize,
    /// Index of the slot the next push will write to.
    head: usize,
    filled: bool,
}

impl CircularBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be non-zero");
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            filled: false,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.slots.len() < self.capacity {
            self.slots.push(line);
            self.head = self.slots.len() % self.capacity;
            self.filled = self.slots.len() == self.capacity;
        } else {
            if let Some(slot) = self.slots.get_mut(self.head) {
                *slot = line;
            }
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Returns the retained lines in insertion order (oldest remaining first).
    pub fn get(&self) -> Vec<String> {
        if !self.filled {
            return self.slots.clone();
        }
        let mut out = Vec::with_capacity(self.capacity);
        for offset in 0..self.capacity {
            let idx = (self.head + offset) % self.capacity;
            if let Some(line) = self.slots.get(idx) {
                out.push(line.clone());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
        self.filled = false;
    }
}
