use crate::candle_data_loader_util::*;
use crate::candle_vae_config::ImageShape;
use crate::error::VaeError;

use candle_core::{Device, Tensor};

pub struct MinibatchData {
    /// images (b x c x h x w)
    pub input: Tensor,
    /// sample indexes of the rows of `input`
    pub samples: Vec<usize>,
}

/// `DataLoader` for minibatch learning
pub trait DataLoader {
    fn minibatch_data(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData>;

    fn num_minibatch(&self) -> usize;

    fn num_samples(&self) -> usize;

    /// Reshuffle and cut into minibatches of `batch_size`
    fn shuffle_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()>;

    /// Cut into minibatches of `batch_size` keeping the sample order
    fn ordered_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()>;
}

///
/// A simple data loader for an in-memory image tensor `[N, C, H, W]`.
/// The number of samples is the size of the first axis.
///
pub struct InMemoryData {
    images: Tensor,
    minibatches: Minibatches,
}

impl InMemoryData {
    ///
    /// Create a data loader over `images` (n x c x h x w)
    ///
    /// * `images` - images, checked against `image_shape`
    /// * `image_shape` - expected image shape
    /// * `seed` - seed for the shuffling order
    ///
    pub fn new(images: Tensor, image_shape: &ImageShape, seed: Option<u64>) -> anyhow::Result<Self> {
        let (n, c, h, w) = images.dims4()?;
        if (c, h, w) != (image_shape.channels, image_shape.height, image_shape.width) {
            return Err(VaeError::shape_mismatch(image_shape.batch_dims(n), images.dims()).into());
        }
        if n == 0 {
            return Err(VaeError::data("no images").into());
        }

        Ok(Self {
            images,
            minibatches: Minibatches::new(n, seed),
        })
    }

    pub fn images(&self) -> &Tensor {
        &self.images
    }
}

impl DataLoader for InMemoryData {
    fn minibatch_data(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData> {
        let input = take_chunk(
            &self.minibatches.chunks,
            batch_idx,
            target_device,
            &self.images,
        )?;
        Ok(MinibatchData {
            input,
            samples: self.minibatches.chunks[batch_idx].clone(),
        })
    }

    fn num_minibatch(&self) -> usize {
        self.minibatches.num_chunks()
    }

    fn num_samples(&self) -> usize {
        self.minibatches.size()
    }

    fn shuffle_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()> {
        if batch_size == 0 {
            return Err(VaeError::invalid_config("batch size must be >= 1").into());
        }
        self.minibatches.shuffle_minibatch(batch_size);
        Ok(())
    }

    fn ordered_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()> {
        if batch_size == 0 {
            return Err(VaeError::invalid_config("batch size must be >= 1").into());
        }
        self.minibatches.ordered_minibatch(batch_size);
        Ok(())
    }
}
