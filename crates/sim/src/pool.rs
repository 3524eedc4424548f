/// Ping-pong pair of equally sized buffers plus a selector bit.
///
/// The only mutating access is [`StatePool::write_then_flip`], which hands out
/// the live buffer for reading and the other buffer for writing, then flips.
/// A pass can therefore never read the buffer it is writing.
///
/// Generic over the buffer type so the CPU engine (`StateTexture`) and the
/// wgpu backend (GPU render targets) share the same selector logic.
#[derive(Debug, Clone)]
pub struct StatePool<B> {
    buffers: [B; 2],
    live: usize,
    flips: u64,
}

impl<B> StatePool<B> {
    /// `live` holds the initial state; `back` is the first write target.
    pub fn new(live: B, back: B) -> Self {
        Self {
            buffers: [live, back],
            live: 0,
            flips: 0,
        }
    }

    /// The most recently completed state.
    pub fn current(&self) -> &B {
        &self.buffers[self.live]
    }

    /// Index (0 or 1) of the live buffer.
    pub fn live_index(&self) -> usize {
        self.live
    }

    /// Number of completed write passes.
    pub fn flips(&self) -> u64 {
        self.flips
    }

    /// Run one pass reading the live buffer and writing the other, then flip.
    pub fn write_then_flip<R>(&mut self, pass: impl FnOnce(&B, &mut B) -> R) -> R {
        let (first, second) = self.buffers.split_at_mut(1);
        let (live, back) = if self.live == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        };
        let out = pass(live, back);
        self.live ^= 1;
        self.flips += 1;
        out
    }

    #[cfg(test)]
    pub(crate) fn back_mut(&mut self) -> &mut B {
        &mut self.buffers[self.live ^ 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_first_buffer() {
        let pool = StatePool::new(1, 2);
        assert_eq!(*pool.current(), 1);
        assert_eq!(pool.live_index(), 0);
        assert_eq!(pool.flips(), 0);
    }

    #[test]
    fn write_goes_to_back_then_flips() {
        let mut pool = StatePool::new(10, 0);
        pool.write_then_flip(|live, back| *back = *live + 1);
        assert_eq!(*pool.current(), 11);
        assert_eq!(pool.live_index(), 1);

        pool.write_then_flip(|live, back| *back = *live + 1);
        assert_eq!(*pool.current(), 12);
        assert_eq!(pool.live_index(), 0);
        assert_eq!(pool.flips(), 2);
    }

    #[test]
    fn pass_never_sees_its_own_output() {
        let mut pool = StatePool::new(vec![1.0f32; 4], vec![f32::NAN; 4]);
        for _ in 0..5 {
            pool.write_then_flip(|live, back| {
                assert!(live.iter().all(|v| v.is_finite()));
                back.copy_from_slice(live);
            });
        }
        assert_eq!(pool.current(), &vec![1.0; 4]);
    }
}
