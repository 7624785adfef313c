//! Named accessors over flat accumulator buffers.
//!
//! Selection accumulators interleave values and indices in one flat slice.
//! These views keep the sorted-insertion and tie-break logic free of raw
//! offset arithmetic.

use crate::element::Element;

/// View over a min+argmin accumulator: `width` running minima followed by
/// `width` indices, indices stored in the element type.
pub(crate) struct MinArgMinView<'a, T> {
    buf: &'a mut [T],
    width: usize,
}

impl<'a, T: Element> MinArgMinView<'a, T> {
    pub fn new(buf: &'a mut [T], width: usize) -> Self {
        debug_assert_eq!(buf.len(), 2 * width);
        MinArgMinView { buf, width }
    }

    pub fn value(&self, k: usize) -> T {
        self.buf[k]
    }

    pub fn index(&self, k: usize) -> T {
        self.buf[self.width + k]
    }

    pub fn set(&mut self, k: usize, value: T, index: T) {
        self.buf[k] = value;
        self.buf[self.width + k] = index;
    }

    /// Keeps the smaller value; on equal values the smaller index wins, so
    /// the earliest inner index survives under any visit order.
    pub fn offer(&mut self, k: usize, value: T, index: T) {
        let held = self.value(k);
        if value < held || (value == held && index < self.index(k)) {
            self.set(k, value, index);
        }
    }
}

/// Read side of the min+argmin layout, for merging partial accumulators.
pub(crate) struct MinArgMinReader<'a, T> {
    buf: &'a [T],
    width: usize,
}

impl<'a, T: Element> MinArgMinReader<'a, T> {
    pub fn new(buf: &'a [T], width: usize) -> Self {
        debug_assert_eq!(buf.len(), 2 * width);
        MinArgMinReader { buf, width }
    }

    pub fn value(&self, k: usize) -> T {
        self.buf[k]
    }

    pub fn index(&self, k: usize) -> T {
        self.buf[self.width + k]
    }
}

/// View over one component's sorted run inside an arg-k-min accumulator.
///
/// The run holds `k` `(value, index)` pairs kept ascending by value: slot
/// `s` of component `comp` sits at `comp + s * 2 * width`, value first,
/// index `width` elements later.
pub(crate) struct SortedRunView<'a, T> {
    buf: &'a mut [T],
    comp: usize,
    width: usize,
    k: usize,
}

impl<'a, T: Element> SortedRunView<'a, T> {
    pub fn new(buf: &'a mut [T], comp: usize, width: usize, k: usize) -> Self {
        debug_assert_eq!(buf.len(), 2 * width * k);
        SortedRunView {
            buf,
            comp,
            width,
            k,
        }
    }

    fn slot(&self, s: usize) -> usize {
        self.comp + s * 2 * self.width
    }

    pub fn value(&self, s: usize) -> T {
        self.buf[self.slot(s)]
    }

    pub fn index(&self, s: usize) -> T {
        self.buf[self.slot(s) + self.width]
    }

    pub fn set(&mut self, s: usize, value: T, index: T) {
        let slot = self.slot(s);
        self.buf[slot] = value;
        self.buf[slot + self.width] = index;
    }

    /// Bounded sorted insertion: candidates are ranked by `(value, index)`,
    /// so strictly smaller values displace, equal values keep the earliest
    /// index, and anything not beating the worst kept entry is dropped.
    pub fn insert(&mut self, value: T, index: T) {
        if !self.beats(value, index, self.k - 1) {
            return;
        }
        let mut s = self.k - 1;
        while s > 0 && self.beats(value, index, s - 1) {
            let (shifted_value, shifted_index) = (self.value(s - 1), self.index(s - 1));
            self.set(s, shifted_value, shifted_index);
            s -= 1;
        }
        self.set(s, value, index);
    }

    fn beats(&self, value: T, index: T, s: usize) -> bool {
        let held = self.value(s);
        value < held || (value == held && index < self.index(s))
    }
}

/// Read side of the sorted-run layout, for merging partial accumulators.
pub(crate) struct SortedRunReader<'a, T> {
    buf: &'a [T],
    comp: usize,
    width: usize,
}

impl<'a, T: Element> SortedRunReader<'a, T> {
    pub fn new(buf: &'a [T], comp: usize, width: usize) -> Self {
        SortedRunReader { buf, comp, width }
    }

    pub fn value(&self, s: usize) -> T {
        self.buf[self.comp + s * 2 * self.width]
    }

    pub fn index(&self, s: usize) -> T {
        self.buf[self.comp + s * 2 * self.width + self.width]
    }
}
