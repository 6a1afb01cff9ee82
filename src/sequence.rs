use crate::config::TaskConfig;
use crate::error::{NBackError, Result};
use rand::Rng;
use std::ops::RangeInclusive;

/// The numbers shown during one run, plus a cursor over them.
///
/// Position `i` is a target iff `i >= n` and `numbers[i] == numbers[i - n]`.
/// The cursor starts before the first number; `advance` moves it and stamps
/// the time the new number was shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    n: usize,
    numbers: Vec<u32>,
    cursor: Option<usize>,
    time_shown_ms: u64,
}

impl Sequence {
    /// Draw a fresh sequence for `config`.
    ///
    /// Positions before `n` are drawn freely. Later positions copy the number
    /// `n` back with `target_probability`, and otherwise draw a different
    /// number so non-targets never match by accident. A single-value range
    /// cannot avoid matching, so every eligible position becomes a target.
    ///
    /// `config` is validated first, since its fields are public.
    pub fn generate<R: Rng + ?Sized>(config: &TaskConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let range = config.number_range.clone();
        let mut numbers: Vec<u32> = Vec::with_capacity(config.sequence_length);

        for i in 0..config.sequence_length {
            let next = if i < config.n {
                rng.gen_range(range.clone())
            } else {
                let back = numbers[i - config.n];
                if rng.gen_bool(config.target_probability) {
                    back
                } else {
                    draw_other(rng, &range, back)
                }
            };
            numbers.push(next);
        }

        Ok(Self {
            n: config.n,
            numbers,
            cursor: None,
            time_shown_ms: 0,
        })
    }

    /// Build a sequence from known numbers, e.g. to replay a recorded run
    pub fn from_numbers(n: usize, numbers: Vec<u32>) -> Result<Self> {
        if n < 1 || numbers.len() <= n {
            return Err(NBackError::InvalidConfiguration(format!(
                "a {}-back sequence needs more than {} numbers, got {}",
                n,
                n,
                numbers.len()
            )));
        }
        Ok(Self {
            n,
            numbers,
            cursor: None,
            time_shown_ms: 0,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn numbers(&self) -> &[u32] {
        &self.numbers
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// Index of the number currently shown, `None` before the first advance
    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<u32> {
        self.cursor.map(|i| self.numbers[i])
    }

    /// Ground truth for the current position; false before the first advance
    pub fn is_target(&self) -> bool {
        self.cursor.is_some_and(|i| self.is_target_at(i))
    }

    pub fn is_target_at(&self, index: usize) -> bool {
        index >= self.n
            && index < self.numbers.len()
            && self.numbers[index] == self.numbers[index - self.n]
    }

    pub fn target_count(&self) -> usize {
        (0..self.numbers.len())
            .filter(|&i| self.is_target_at(i))
            .count()
    }

    pub fn has_next(&self) -> bool {
        match self.cursor {
            None => !self.numbers.is_empty(),
            Some(i) => i + 1 < self.numbers.len(),
        }
    }

    /// Move to the next number and record `now_ms` as the time it was shown
    pub fn advance(&mut self, now_ms: u64) -> Result<u32> {
        if !self.has_next() {
            return Err(NBackError::SequenceExhausted {
                length: self.numbers.len(),
            });
        }
        let next = self.cursor.map_or(0, |i| i + 1);
        self.cursor = Some(next);
        self.time_shown_ms = now_ms;
        Ok(self.numbers[next])
    }

    pub fn time_shown_ms(&self) -> u64 {
        self.time_shown_ms
    }
}

/// Uniform draw from `range` excluding `avoid`
fn draw_other<R: Rng + ?Sized>(rng: &mut R, range: &RangeInclusive<u32>, avoid: u32) -> u32 {
    let (lo, hi) = (*range.start(), *range.end());
    if lo == hi {
        return avoid;
    }
    let v = rng.gen_range(lo..hi);
    if v >= avoid {
        v + 1
    } else {
        v
    }
}
