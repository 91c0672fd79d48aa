use anyhow::anyhow;
use candle_core::{Device, Tensor};
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;

///
/// A helper `struct` for shuffling and creating minibatch indexes;
/// after `shuffle_minibatch` or `ordered_minibatch` is called,
/// `chunks` partition the sample indexes. The last chunk may be
/// shorter than `batch_size`.
///
pub struct Minibatches {
    pub samples: Vec<usize>,
    pub chunks: Vec<Vec<usize>>,
    rng: StdRng,
}

impl Minibatches {
    pub fn new(size: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            samples: (0..size).collect(),
            chunks: vec![],
            rng,
        }
    }

    /// Shuffle samples, then cut them into consecutive chunks, so each
    /// sample is visited exactly once per pass
    pub fn shuffle_minibatch(&mut self, batch_size: usize) {
        debug_assert!(batch_size > 0);
        self.samples.shuffle(&mut self.rng);
        self.chunks = self
            .samples
            .chunks(batch_size)
            .map(|c| c.to_vec())
            .collect();
    }

    /// Chunks in the original sample order
    pub fn ordered_minibatch(&mut self, batch_size: usize) {
        debug_assert!(batch_size > 0);
        self.samples.sort_unstable();
        self.chunks = self
            .samples
            .chunks(batch_size)
            .map(|c| c.to_vec())
            .collect();
    }

    pub fn size(&self) -> usize {
        self.samples.len()
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }
}

/// Take rows `chunks[batch_idx]` of `data` (first axis) onto the
/// target device
pub fn take_chunk(
    chunks: &[Vec<usize>],
    batch_idx: usize,
    target_device: &Device,
    data: &Tensor,
) -> anyhow::Result<Tensor> {
    let chunk = chunks.get(batch_idx).ok_or(anyhow!(
        "invalid index = {} vs. total # = {}",
        batch_idx,
        chunks.len()
    ))?;

    let idx: Vec<u32> = chunk.iter().map(|&i| i as u32).collect();
    let idx = Tensor::from_vec(idx, chunk.len(), data.device())?;
    Ok(data.index_select(&idx, 0)?.to_device(target_device)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_partition_samples() {
        let mut mb = Minibatches::new(37, Some(1));
        mb.shuffle_minibatch(16);
        assert_eq!(mb.num_chunks(), 3);
        assert_eq!(mb.chunks[2].len(), 5);

        let mut seen: Vec<usize> = mb.chunks.iter().flatten().copied().collect();
        seen.sort();
        assert_eq!(seen, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn seeded_shuffles_repeat() {
        let mut a = Minibatches::new(50, Some(7));
        let mut b = Minibatches::new(50, Some(7));
        a.shuffle_minibatch(10);
        b.shuffle_minibatch(10);
        assert_eq!(a.chunks, b.chunks);

        a.ordered_minibatch(10);
        assert_eq!(a.chunks[0], (0..10).collect::<Vec<_>>());
    }
}
