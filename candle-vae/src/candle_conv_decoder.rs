use crate::candle_aux_layers::*;
use crate::candle_conv_encoder::pre_flatten_volume;
use crate::candle_model_traits::*;
use crate::candle_vae_config::{ImageShape, VaeConfig};
use candle_core::{Result, Tensor};
use candle_nn::{ops, Activation, Conv2d, ConvTranspose2d, Linear, Module};

const KERNEL_SIZE: usize = 3;
const UPSAMPLE_CHANNELS: usize = 32;

/////////////////////////////////////
// Transposed convolution decoder //
/////////////////////////////////////

pub struct ConvDecoder {
    image_shape: ImageShape,
    n_latent: usize,
    volume: (usize, usize, usize),
    fc: Linear,
    upsample: ConvTranspose2d,
    output: Conv2d,
}

impl ConvDecoder {
    /// Will create a new decoder mirroring the encoder's downsampling
    /// with these variables:
    ///
    /// * `dec.fc.weight` latent -> pre-flatten feature volume
    /// * `dec.up.weight` stride-2 transposed convolution
    /// * `dec.out.weight` final convolution to image channels
    pub fn new(config: &VaeConfig, vs: candle_nn::VarBuilder) -> Result<Self> {
        let image_shape = config.image_shape;
        let volume = pre_flatten_volume(&image_shape);
        let (c, h, w) = volume;

        let fc = candle_nn::linear(config.latent_dim, c * h * w, vs.pp("dec.fc"))?;
        let upsample = same_conv_transpose2d(c, UPSAMPLE_CHANNELS, KERNEL_SIZE, 2, vs.pp("dec.up"))?;
        let output = same_conv2d(
            UPSAMPLE_CHANNELS,
            image_shape.channels,
            KERNEL_SIZE,
            1,
            vs.pp("dec.out"),
        )?;

        Ok(Self {
            image_shape,
            n_latent: config.latent_dim,
            volume,
            fc,
            upsample,
            output,
        })
    }
}

impl DecoderModuleT for ConvDecoder {
    /// pixel intensities in (0, 1)
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor> {
        let (n, _) = z_nk.dims2()?;
        let (c, h, w) = self.volume;

        let h_nd = Activation::Relu.forward(&self.fc.forward(z_nk)?)?;
        let h_nchw = h_nd.reshape((n, c, h, w))?;
        let up_nchw = Activation::Relu.forward(&self.upsample.forward(&h_nchw)?)?;
        ops::sigmoid(&self.output.forward(&up_nchw)?)
    }

    fn image_shape(&self) -> ImageShape {
        self.image_shape
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}
