use crate::embed_common::*;

use candle_core::Tensor;
use candle_vae::candle_data_loader::InMemoryData;
use candle_vae::candle_inference::{OptimizerKind, TrainConfig};
use candle_vae::candle_latent_manifold::decode_manifold;
use candle_vae::candle_vae_config::{DEFAULT_HIDDEN_DIM, DEFAULT_KL_WEIGHT, DEFAULT_LATENT_DIM};
use candle_vae::candle_vae_inference::{ModelOutput, TrainScores, Vae};
use digit_data::common_io::{mkdir, write_lines, write_types};
use digit_data::holdout::{split_table, DEFAULT_HOLDOUT_SEED, DEFAULT_NUM_HOLDOUT};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;

const NUM_DISPLAY_SAMPLES: usize = 100;

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum OptimizerArg {
    Rmsprop,
    Adamw,
}

impl From<&OptimizerArg> for OptimizerKind {
    fn from(arg: &OptimizerArg) -> Self {
        match arg {
            OptimizerArg::Rmsprop => OptimizerKind::RmsProp,
            OptimizerArg::Adamw => OptimizerKind::AdamW,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(
        required = true,
        help = "Digit csv files",
        long_help = "Comma-separated digit files (`.csv` or `.csv.gz`).\n\
		     One image per row after a header line.\n\
		     A leading `label` column is detected from the header;\n\
		     rows of files without one are labeled 11.\n\
		     Multiple files are stacked in the given order."
    )]
    data_files: Vec<Box<str>>,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for results.\n\
		     Specify the output file or prefix for generated files:\n\
		     - {out}.safetensors\n\
		     - {out}.model.json\n\
		     - {out}.loss.tsv\n\
		     - {out}.recon.tsv.gz\n\
		     - {out}.sample_index.txt\n\
		     - {out}.latent.tsv.gz\n\
		     - {out}.manifold.tsv.gz (2 latent dimensions only)\n"
    )]
    out: Box<str>,

    #[arg(
        long,
        default_value_t = 28,
        help = "Image height",
        long_help = "Image height in pixels; must be even."
    )]
    height: usize,

    #[arg(
        long,
        default_value_t = 28,
        help = "Image width",
        long_help = "Image width in pixels; must be even."
    )]
    width: usize,

    #[arg(
        long,
        default_value_t = 1,
        help = "Image channels",
        long_help = "Number of channels per pixel.\n\
		     Rows store pixels in height, width, channel order."
    )]
    channels: usize,

    #[arg(
        short = 'k',
        long,
        default_value_t = DEFAULT_LATENT_DIM,
        help = "Latent dimension",
        long_help = "Dimension of the latent Gaussian.\n\
		     The manifold picture is drawn only for 2."
    )]
    latent_dim: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_HIDDEN_DIM,
        help = "Hidden layer width",
        long_help = "Width of the dense layer between the convolutions\n\
		     and the latent heads of the encoder."
    )]
    hidden_dim: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_KL_WEIGHT,
        help = "KL weight",
        long_help = "Weight of the KL divergence term relative to the\n\
		     per-pixel mean binary cross entropy."
    )]
    kl_weight: f64,

    #[arg(
        long,
        short = 'i',
        default_value_t = 50,
        help = "Number of training epochs",
        long_help = "Number of epochs over the training images."
    )]
    epochs: usize,

    #[arg(
        long,
        default_value_t = 1e-3,
        help = "Learning rate",
        long_help = "Learning rate for the optimizer."
    )]
    learning_rate: f32,

    #[arg(
        long,
        value_enum,
        default_value = "rmsprop",
        help = "Optimizer",
        long_help = "Optimizer to train the encoder and decoder.\n\
		     Options: rmsprop, adamw."
    )]
    optimizer: OptimizerArg,

    #[arg(
        long,
        default_value_t = DEFAULT_NUM_HOLDOUT,
        help = "Number of held-out images",
        long_help = "Number of random images kept out of training for\n\
		     validation and for the output tables.\n\
		     At most half of the images are held out."
    )]
    num_holdout: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_HOLDOUT_SEED,
        help = "Holdout seed",
        long_help = "Random seed for choosing the held-out images."
    )]
    holdout_seed: u64,

    #[arg(
        long,
        default_value_t = 20,
        help = "Manifold tiles per side",
        long_help = "Number of decoded tiles along each side of the\n\
		     latent manifold picture."
    )]
    manifold_size: usize,

    #[command(flatten)]
    device_args: DeviceArgs,

    #[arg(
        long,
        short,
        help = "Verbosity",
        long_help = "Enable verbose output.\n\
		     Prints per-epoch losses instead of a progress bar."
    )]
    verbose: bool,
}

pub fn fit_vae_model(args: &TrainArgs) -> anyhow::Result<()> {
    init_logger(args.verbose);

    let image_shape = ImageShape::new(args.height, args.width, args.channels);
    let config = VaeConfig {
        image_shape,
        latent_dim: args.latent_dim,
        hidden_dim: args.hidden_dim,
        kl_weight: args.kl_weight,
    };
    config.validate()?;

    let train_config = TrainConfig {
        learning_rate: args.learning_rate,
        batch_size: args.device_args.minibatch_size,
        num_epochs: args.epochs,
        optimizer: (&args.optimizer).into(),
        verbose: args.verbose,
        show_progress: true,
    };
    train_config.validate()?;

    // 1. read and split the data
    let tables = args
        .data_files
        .iter()
        .map(|f| DigitTable::read_csv(f, &image_shape))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let data = DigitTable::concat(tables)?;
    let split = split_table(&data, args.num_holdout, args.holdout_seed);

    if split.train.nrows() == 0 {
        return Err(anyhow::anyhow!("no training images"));
    }

    let context = args.device_args.context()?;
    let dev = context.device().clone();

    let mut train_data = InMemoryData::new(
        split.train.to_image_tensor(&image_shape, &dev)?,
        &image_shape,
        args.device_args.seed,
    )?;

    let mut valid_data = if split.valid.nrows() > 0 {
        Some(InMemoryData::new(
            split.valid.to_image_tensor(&image_shape, &dev)?,
            &image_shape,
            args.device_args.seed,
        )?)
    } else {
        None
    };

    // 2. train
    let model = ConvVae::new(&config, &context)?;
    info!("{} trainable parameters", context.num_parameters());

    let vae = Vae::build(&model, &context);
    let scores = vae.train_encoder_decoder(&mut train_data, valid_data.as_mut(), &train_config)?;

    mkdir(&args.out)?;
    let files = ModelFiles::new(&args.out);
    context.save(&files.weights)?;
    config.to_json(&files.config)?;
    write_loss_trace(&scores, &format!("{}.loss.tsv", args.out))?;

    // 3. outputs on the held-out images
    if let Some(valid_data) = valid_data.as_mut() {
        let output = vae.predict(valid_data, train_config.batch_size)?;
        write_holdout_outputs(&output, &split.valid, &args.out, context.seed())?;
    } else {
        info!("nothing held out; skip reconstructions and latent means");
    }

    if config.latent_dim == 2 {
        let manifold = decode_manifold(&model, args.manifold_size, &dev)?;
        write_tensor_tsv(
            &manifold,
            &format!("{}.manifold.tsv.gz", args.out),
            None,
            None,
        )?;
    }

    context.finish()?;
    info!("done");
    Ok(())
}

/// Sorted random subset of at most 100 rows out of `ntot`
fn sample_display_rows(ntot: usize, seed: Option<u64>) -> Vec<usize> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut rows = sample(&mut rng, ntot, NUM_DISPLAY_SAMPLES.min(ntot)).into_vec();
    rows.sort_unstable();
    rows
}

///
/// Write what the model made of the held-out images
///
/// * `{out}.recon.tsv.gz` - reconstructions, one row per image
/// * `{out}.sample_index.txt` - rows picked for display
/// * `{out}.latent.tsv.gz` - latent means of the labeled rows
///
/// * `output` - prediction on `valid`, in row order
/// * `valid` - held-out table
///
fn write_holdout_outputs(
    output: &ModelOutput,
    valid: &DigitTable,
    out: &str,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let ntot = valid.nrows();
    let (n_pred, _) = output.z_mean.dims2()?;
    if n_pred != ntot {
        return Err(anyhow::anyhow!("{} predictions for {} images", n_pred, ntot));
    }

    write_tensor_tsv(&output.recon, &format!("{}.recon.tsv.gz", out), None, None)?;

    let display = sample_display_rows(ntot, seed);
    write_types(&display, &format!("{}.sample_index.txt", out))?;

    let labeled = valid.labeled_rows();
    if labeled.is_empty() {
        info!("no labeled held-out images; skip the latent table");
        return Ok(());
    }

    let idx: Vec<u32> = labeled.iter().map(|&i| i as u32).collect();
    let idx = Tensor::from_vec(idx, labeled.len(), output.z_mean.device())?;
    let labels: Vec<i64> = labeled.iter().map(|&i| valid.labels[i]).collect();
    write_latent(
        &output.z_mean.index_select(&idx, 0)?,
        &labeled,
        &labels,
        &format!("{}.latent.tsv.gz", out),
    )
}

fn write_loss_trace(scores: &TrainScores, file: &str) -> anyhow::Result<()> {
    let mut lines: Vec<Box<str>> = Vec::with_capacity(scores.num_epochs() + 1);
    lines.push("epoch\tloss\treconstruction\tkl\tvalid_loss".into());
    for t in 0..scores.num_epochs() {
        let valid = scores.valid_loss[t]
            .map(|x| x.to_string())
            .unwrap_or_else(|| "NA".to_string());
        lines.push(
            format!(
                "{}\t{}\t{}\t{}\t{}",
                t + 1,
                scores.loss[t],
                scores.reconstruction[t],
                scores.kl[t],
                valid
            )
            .into_boxed_str(),
        );
    }
    write_lines(&lines, file)?;
    info!("wrote loss trace to {}", file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed_common::test_util::*;
    use candle_core::{DType, Device};
    use digit_data::digit_csv::UNLABELED;

    fn held_out(labels: Vec<i64>) -> anyhow::Result<(DigitTable, ModelOutput)> {
        let n = labels.len();
        let table = DigitTable {
            pixels: digit_data::Mat::zeros(n, 4),
            labels,
        };
        // row i sits at (i + 1, -(i + 1))
        let z: Vec<f32> = (1..=n).flat_map(|i| [i as f32, -(i as f32)]).collect();
        let output = ModelOutput {
            z_mean: Tensor::from_vec(z, (n, 2), &Device::Cpu)?,
            z_lnvar: Tensor::zeros((n, 2), DType::F32, &Device::Cpu)?,
            recon: Tensor::zeros((n, 1, 2, 2), DType::F32, &Device::Cpu)?,
        };
        Ok((table, output))
    }

    #[test]
    fn latent_table_keeps_labeled_rows_in_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = temp_file(&dir, "run")?;
        let (valid, output) = held_out(vec![3, UNLABELED, 7, UNLABELED, 1])?;

        write_holdout_outputs(&output, &valid, &out, Some(1))?;

        let latent = read_fields(&format!("{}.latent.tsv.gz", out))?;
        assert_eq!(latent[0], vec!["index", "label", "z1", "z2"]);
        assert_eq!(
            latent[1..].to_vec(),
            vec![
                vec!["0", "3", "1", "-1"],
                vec!["2", "7", "3", "-3"],
                vec!["4", "1", "5", "-5"],
            ]
        );

        let recon = read_fields(&format!("{}.recon.tsv.gz", out))?;
        assert_eq!(recon.len(), 5);
        assert!(recon.iter().all(|r| r.len() == 4));

        let display = read_fields(&format!("{}.sample_index.txt", out))?;
        assert_eq!(display, (0..5).map(|i| vec![i.to_string()]).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn unlabeled_holdout_has_no_latent_table() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = temp_file(&dir, "run")?;
        let (valid, output) = held_out(vec![UNLABELED; 3])?;

        write_holdout_outputs(&output, &valid, &out, None)?;
        assert!(!std::path::Path::new(&format!("{}.latent.tsv.gz", out)).exists());
        assert!(std::path::Path::new(&format!("{}.recon.tsv.gz", out)).exists());
        Ok(())
    }

    #[test]
    fn display_rows_are_a_sorted_subset() {
        let rows = sample_display_rows(250, Some(3));
        assert_eq!(rows.len(), 100);
        assert!(rows.windows(2).all(|w| w[0] < w[1]));
        assert!(rows.iter().all(|&i| i < 250));
        assert_eq!(rows, sample_display_rows(250, Some(3)));
    }

    #[test]
    fn loss_trace_marks_missing_validation() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = temp_file(&dir, "run.loss.tsv")?;
        let scores = TrainScores {
            loss: vec![1.5, 0.5],
            reconstruction: vec![1.25, 0.25],
            kl: vec![2., 1.],
            valid_loss: vec![None, Some(0.75)],
        };

        write_loss_trace(&scores, &file)?;

        let lines = read_fields(&file)?;
        assert_eq!(
            lines,
            vec![
                vec!["epoch", "loss", "reconstruction", "kl", "valid_loss"],
                vec!["1", "1.5", "1.25", "2", "NA"],
                vec!["2", "0.5", "0.25", "1", "0.75"],
            ]
        );
        Ok(())
    }
}
