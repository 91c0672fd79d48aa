use candle_core::{Result, Tensor};
use candle_nn::{Activation, Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig, Module};

/// build a stack of alternating `M` and `A` layers
pub struct StackLayers<M>
where
    M: Module,
{
    module_layers: Vec<M>,
    activation_layers: Vec<Option<Activation>>,
}

impl<M> Module for StackLayers<M>
where
    M: Module,
{
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.clone();
        for (module, activation) in self.module_layers.iter().zip(self.activation_layers.iter()) {
            x = module.forward(&x)?;
            if let Some(activation) = activation {
                x = activation.forward(&x)?;
            }
        }
        Ok(x)
    }
}

impl<M> StackLayers<M>
where
    M: Module,
{
    pub fn new() -> Self {
        Self {
            module_layers: Vec::new(),
            activation_layers: Vec::new(),
        }
    }

    /// Appends a layer after all the current layers.
    pub fn push_with_act(&mut self, layer: M, activation: Activation) {
        self.module_layers.push(layer);
        self.activation_layers.push(Some(activation));
    }
}

impl<M> Default for StackLayers<M>
where
    M: Module,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Convolution stage in a stack
pub struct ConvStage {
    pub out_channels: usize,
    pub stride: usize,
}

/// `k x k` convolution with "same" padding: the output keeps the
/// spatial size for `stride = 1` and halves (rounding up) for `stride = 2`.
///
/// * `kernel` - odd kernel size
pub fn same_conv2d(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    vb: candle_nn::VarBuilder,
) -> Result<Conv2d> {
    debug_assert!(kernel % 2 == 1);
    let config = Conv2dConfig {
        padding: kernel / 2,
        stride,
        ..Default::default()
    };
    candle_nn::conv2d(in_channels, out_channels, kernel, config, vb)
}

/// `k x k` transposed convolution with "same" padding: the output is
/// exactly `stride` times the input along each spatial axis.
///
/// out = (in - 1) * stride - 2 * pad + (k - 1) + output_pad + 1
///
/// * `kernel` - odd kernel size
pub fn same_conv_transpose2d(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    vb: candle_nn::VarBuilder,
) -> Result<ConvTranspose2d> {
    debug_assert!(kernel % 2 == 1);
    debug_assert!(stride >= 1);
    let config = ConvTranspose2dConfig {
        padding: kernel / 2,
        output_padding: stride - 1,
        stride,
        ..Default::default()
    };
    candle_nn::conv_transpose2d(in_channels, out_channels, kernel, config, vb)
}

/// Stack of ReLU-activated "same" convolutions
///
/// Variables are named `{prefix}.{j}.weight` and `{prefix}.{j}.bias`.
///
/// # Returns `(stack, out_channels, spatial_divisor)`
pub fn relu_conv_stack(
    in_channels: usize,
    stages: &[ConvStage],
    kernel: usize,
    vb: candle_nn::VarBuilder,
) -> Result<(StackLayers<Conv2d>, usize, usize)> {
    let mut stack = StackLayers::<Conv2d>::new();
    let mut prev_channels = in_channels;
    let mut divisor = 1;
    for (j, stage) in stages.iter().enumerate() {
        stack.push_with_act(
            same_conv2d(
                prev_channels,
                stage.out_channels,
                kernel,
                stage.stride,
                vb.pp(j.to_string()),
            )?,
            Activation::Relu,
        );
        prev_channels = stage.out_channels;
        divisor *= stage.stride;
    }
    Ok((stack, prev_channels, divisor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn same_padding_shapes() -> Result<()> {
        let dev = Device::Cpu;
        let varmap = candle_nn::VarMap::new();
        let vb = candle_nn::VarBuilder::from_varmap(&varmap, DType::F32, &dev);

        let x = Tensor::randn(0f32, 1., (2, 3, 28, 28), &dev)?;

        let conv = same_conv2d(3, 8, 3, 1, vb.pp("a"))?;
        assert_eq!(conv.forward(&x)?.dims(), &[2, 8, 28, 28]);

        let down = same_conv2d(3, 8, 3, 2, vb.pp("b"))?;
        let h = down.forward(&x)?;
        assert_eq!(h.dims(), &[2, 8, 14, 14]);

        let up = same_conv_transpose2d(8, 4, 3, 2, vb.pp("c"))?;
        assert_eq!(up.forward(&h)?.dims(), &[2, 4, 28, 28]);
        Ok(())
    }

    #[test]
    fn conv_stack_tracks_channels() -> Result<()> {
        let dev = Device::Cpu;
        let varmap = candle_nn::VarMap::new();
        let vb = candle_nn::VarBuilder::from_varmap(&varmap, DType::F32, &dev);

        let stages = [
            ConvStage {
                out_channels: 4,
                stride: 1,
            },
            ConvStage {
                out_channels: 6,
                stride: 2,
            },
        ];
        let (stack, channels, divisor) = relu_conv_stack(1, &stages, 3, vb)?;
        assert_eq!(varmap.all_vars().len(), 4);
        assert_eq!((channels, divisor), (6, 2));

        let x = Tensor::ones((1, 1, 8, 8), DType::F32, &dev)?;
        let h = stack.forward(&x)?;
        assert_eq!(h.dims(), &[1, 6, 4, 4]);
        // relu output
        assert!(h.min_all()?.to_scalar::<f32>()? >= 0.);
        Ok(())
    }
}
