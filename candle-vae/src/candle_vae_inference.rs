use crate::candle_context::ExecutionContext;
use crate::candle_data_loader::*;
use crate::candle_inference::TrainConfig;
use crate::candle_model_traits::{DecoderModuleT, EncoderModuleT};
use crate::candle_optimizers::VaeOptimizer;
use crate::candle_vae_model::VaeModel;
use crate::error::{VaeError, VaeResult};

use candle_core::{Device, Tensor};
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;

/// Keep typed errors raised inside a data loader; anything else
/// becomes [`VaeError::Data`]
pub fn loader_error(e: anyhow::Error) -> VaeError {
    let e = match e.downcast::<VaeError>() {
        Ok(e) => return e,
        Err(e) => e,
    };
    match e.downcast::<candle_core::Error>() {
        Ok(e) => VaeError::Candle(e),
        Err(e) => VaeError::data(e.to_string()),
    }
}

/// Per-epoch averages over minibatches
#[derive(Default, Debug, Clone)]
pub struct TrainScores {
    pub loss: Vec<f32>,
    pub reconstruction: Vec<f32>,
    pub kl: Vec<f32>,
    pub valid_loss: Vec<Option<f32>>,
}

impl TrainScores {
    pub fn num_epochs(&self) -> usize {
        self.loss.len()
    }
}

/// Averages of a pass over a data set
#[derive(Debug, Clone, Copy)]
pub struct EvalScores {
    pub loss: f32,
    pub reconstruction: f32,
    pub kl: f32,
}

/// Results of running every image through the model once
pub struct ModelOutput {
    /// latent means (n x k), in sample order
    pub z_mean: Tensor,
    /// latent log-variances (n x k), in sample order
    pub z_lnvar: Tensor,
    /// reconstructions (n x c x h x w), in sample order
    pub recon: Tensor,
}

pub struct Vae<'a, Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    pub model: &'a VaeModel<Enc, Dec>,
    pub context: &'a ExecutionContext,
}

impl<'a, Enc, Dec> Vae<'a, Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    pub fn build(model: &'a VaeModel<Enc, Dec>, context: &'a ExecutionContext) -> Self {
        Self { model, context }
    }

    fn device(&self) -> &Device {
        self.context.device()
    }

    /// Train the VAE model
    /// * `data` - training data, reshuffled every epoch
    /// * `valid` - held-out data scored after each epoch
    /// * `train_config` - training configuration
    pub fn train_encoder_decoder<DataL>(
        &self,
        data: &mut DataL,
        mut valid: Option<&mut DataL>,
        train_config: &TrainConfig,
    ) -> VaeResult<TrainScores>
    where
        DataL: DataLoader,
    {
        train_config.validate()?;

        let mut optimizer = VaeOptimizer::new(
            train_config.optimizer,
            self.context.parameters().all_vars(),
            train_config.learning_rate.into(),
        )?;

        let pb = ProgressBar::new(train_config.num_epochs as u64);

        if !train_config.show_progress || train_config.verbose {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mut scores = TrainScores::default();

        info!(
            "Start training VAE: {} samples, {} epochs, {:?}",
            data.num_samples(),
            train_config.num_epochs,
            train_config.optimizer
        );

        for epoch in 0..train_config.num_epochs {
            data.shuffle_minibatch(train_config.batch_size)
                .map_err(loader_error)?;

            let mut loss_tot = 0f32;
            let mut recon_tot = 0f32;
            let mut kl_tot = 0f32;
            let mut n_tot = 0usize;

            for b in 0..data.num_minibatch() {
                let mb = data
                    .minibatch_data(b, self.device())
                    .map_err(loader_error)?;
                let x = &mb.input;

                let forward = self.model.forward(x)?;
                let loss = self.model.loss(x, &forward)?;

                let loss_val = loss.total_value()?;
                if !loss_val.is_finite() {
                    return Err(VaeError::NumericInstability {
                        epoch,
                        batch: b,
                        value: loss_val,
                    });
                }

                optimizer.backward_step(&loss.total)?;

                let nb = mb.samples.len();
                loss_tot += loss_val * nb as f32;
                recon_tot += loss.reconstruction_sum()?;
                kl_tot += loss.kl_sum()?;
                n_tot += nb;
            }

            let n_tot = n_tot.max(1) as f32;
            scores.loss.push(loss_tot / n_tot);
            scores.reconstruction.push(recon_tot / n_tot);
            scores.kl.push(kl_tot / n_tot);

            let valid_scores = match valid.as_deref_mut() {
                Some(valid) => Some(self.evaluate(valid, train_config.batch_size)?),
                None => None,
            };
            scores.valid_loss.push(valid_scores.map(|v| v.loss));

            pb.inc(1);

            if train_config.verbose {
                info!(
                    "[{}] loss: {:.5} (bce: {:.5}, kl: {:.5})",
                    epoch + 1,
                    loss_tot / n_tot,
                    recon_tot / n_tot,
                    kl_tot / n_tot,
                );
                if let Some(v) = valid_scores {
                    info!(
                        "[{}] valid: {:.5} (bce: {:.5}, kl: {:.5})",
                        epoch + 1,
                        v.loss,
                        v.reconstruction,
                        v.kl
                    );
                }
            }
        } // each epoch

        pb.finish_and_clear();
        info!("done model training");
        Ok(scores)
    }

    /// Average loss over `data` without updating parameters
    pub fn evaluate<DataL>(&self, data: &mut DataL, batch_size: usize) -> VaeResult<EvalScores>
    where
        DataL: DataLoader,
    {
        data.ordered_minibatch(batch_size)
            .map_err(loader_error)?;

        let mut loss_tot = 0f32;
        let mut recon_tot = 0f32;
        let mut kl_tot = 0f32;
        let mut n_tot = 0usize;

        for b in 0..data.num_minibatch() {
            let mb = data
                .minibatch_data(b, self.device())
                .map_err(loader_error)?;
            let forward = self.model.forward(&mb.input)?;
            let loss = self.model.loss(&mb.input, &forward)?;
            let nb = mb.samples.len();
            loss_tot += loss.total_value()? * nb as f32;
            recon_tot += loss.reconstruction_sum()?;
            kl_tot += loss.kl_sum()?;
            n_tot += nb;
        }

        let n_tot = n_tot.max(1) as f32;
        Ok(EvalScores {
            loss: loss_tot / n_tot,
            reconstruction: recon_tot / n_tot,
            kl: kl_tot / n_tot,
        })
    }

    /// Encode, sample and decode every image, keeping the sample order.
    /// Outputs are moved to the cpu.
    pub fn predict<DataL>(&self, data: &mut DataL, batch_size: usize) -> VaeResult<ModelOutput>
    where
        DataL: DataLoader,
    {
        data.ordered_minibatch(batch_size)
            .map_err(loader_error)?;

        let mut z_mean = vec![];
        let mut z_lnvar = vec![];
        let mut recon = vec![];

        for b in 0..data.num_minibatch() {
            let mb = data
                .minibatch_data(b, self.device())
                .map_err(loader_error)?;
            let forward = self.model.forward(&mb.input)?;
            z_mean.push(forward.z_mean.to_device(&Device::Cpu)?);
            z_lnvar.push(forward.z_lnvar.to_device(&Device::Cpu)?);
            recon.push(forward.recon.to_device(&Device::Cpu)?);
        }

        if recon.is_empty() {
            return Err(VaeError::data("nothing to predict"));
        }

        Ok(ModelOutput {
            z_mean: Tensor::cat(&z_mean, 0)?,
            z_lnvar: Tensor::cat(&z_lnvar, 0)?,
            recon: Tensor::cat(&recon, 0)?,
        })
    }
}
