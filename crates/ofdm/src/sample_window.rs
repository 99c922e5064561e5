/// A linear overlap buffer with a fixed capacity and a current fill level.
///
/// The symbol estimator keeps the unconsumed tail of each receive window at
/// the front of this buffer between calls, so the capacity is allocated once
/// and samples only ever move toward index zero.
pub struct SampleWindow<T> {
    data: Vec<T>,
    length: usize,
}

impl<T: Default + Copy> SampleWindow<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Window capacity cannot be zero");
        Self {
            data: vec![T::default(); capacity],
            length: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_full(&self) -> bool {
        self.length == self.capacity()
    }

    /// Returns the valid prefix of the buffer.
    pub fn filled(&self) -> &[T] {
        &self.data[..self.length]
    }

    /// Returns the writable suffix of the buffer.
    pub fn vacant_mut(&mut self) -> &mut [T] {
        let length = self.length;
        &mut self.data[length..]
    }

    /// Marks samples written through `vacant_mut` as valid.
    pub fn commit(&mut self, total: usize) {
        assert!(
            self.length + total <= self.capacity(),
            "Committed {} samples into a window holding {} of {}",
            total,
            self.length,
            self.capacity()
        );
        self.length += total;
    }

    /// Moves the tail starting at `start` to the front of the buffer.
    pub fn slide_to(&mut self, start: usize) {
        assert!(
            start <= self.length,
            "Slide offset {} exceeds fill level {}",
            start,
            self.length
        );
        self.data.copy_within(start..self.length, 0);
        self.length -= start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_and_slide_preserves_tail() {
        let mut window = SampleWindow::<u32>::new(8);
        let source: Vec<u32> = (0..8).collect();
        window.vacant_mut().copy_from_slice(&source);
        window.commit(8);
        assert!(window.is_full());

        window.slide_to(5);
        assert_eq!(window.filled(), &[5, 6, 7]);
        assert_eq!(window.vacant_mut().len(), 5);

        window.vacant_mut()[..2].copy_from_slice(&[8, 9]);
        window.commit(2);
        assert_eq!(window.filled(), &[5, 6, 7, 8, 9]);
    }

    #[test]
    #[should_panic]
    fn commit_past_capacity_panics() {
        let mut window = SampleWindow::<u32>::new(4);
        window.commit(5);
    }

    #[test]
    #[should_panic]
    fn slide_past_fill_level_panics() {
        let mut window = SampleWindow::<u32>::new(4);
        window.commit(2);
        window.slide_to(3);
    }
}
