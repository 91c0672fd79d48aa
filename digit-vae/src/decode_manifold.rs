use crate::embed_common::*;

use candle_vae::candle_latent_manifold::decode_manifold;
use digit_data::common_io::mkdir;

#[derive(Args, Debug)]
pub struct ManifoldArgs {
    #[arg(
        long,
        short,
        required = true,
        help = "Trained model header",
        long_help = "Output header of a previous `train` run.\n\
		     The model must have a 2-dimensional latent space."
    )]
    model: Box<str>,

    #[arg(
        long,
        short,
        required = true,
        help = "Output file",
        long_help = "Output file of the decoded (n*H) x (n*W) picture,\n\
		     e.g., manifold.tsv.gz"
    )]
    out: Box<str>,

    #[arg(
        short = 'n',
        long,
        default_value_t = 20,
        help = "Tiles per side",
        long_help = "Number of decoded tiles along each side.\n\
		     Grid points are standard normal quantiles\n\
		     at evenly spaced probabilities in [0.05, 0.95]."
    )]
    manifold_size: usize,

    #[command(flatten)]
    device_args: DeviceArgs,

    #[arg(long, short, help = "Verbosity")]
    verbose: bool,
}

pub fn decode_latent_manifold(args: &ManifoldArgs) -> anyhow::Result<()> {
    init_logger(args.verbose);
    write_manifold(&args.model, args.manifold_size, &args.out, &args.device_args)
}

/// Decode an `n x n` latent grid with a saved model into `out`
fn write_manifold(
    model_header: &str,
    n: usize,
    out: &str,
    device_args: &DeviceArgs,
) -> anyhow::Result<()> {
    let mut context = device_args.context()?;
    let model = load_model(model_header, &mut context)?;

    let manifold = decode_manifold(&model, n, context.device())?;

    mkdir(out)?;
    write_tensor_tsv(&manifold, out, None, None)?;
    info!("wrote {:?} manifold to {}", manifold.dims(), out);

    context.finish()?;
    Ok(())
}
