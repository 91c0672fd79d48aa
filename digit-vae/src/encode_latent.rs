use crate::embed_common::*;

use candle_vae::candle_data_loader::InMemoryData;
use candle_vae::candle_vae_inference::Vae;
use digit_data::common_io::mkdir;

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[arg(
        required = true,
        help = "Digit csv file",
        long_help = "Digit file (`.csv` or `.csv.gz`) to encode,\n\
		     in the same layout as the training files."
    )]
    data_file: Box<str>,

    #[arg(
        long,
        short,
        required = true,
        help = "Trained model header",
        long_help = "Output header of a previous `train` run.\n\
		     Reads {model}.model.json and {model}.safetensors."
    )]
    model: Box<str>,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for results:\n\
		     - {out}.latent.tsv.gz (label, latent means)\n\
		     - {out}.lnvar.tsv.gz (label, latent log-variances)\n\
		     - {out}.recon.tsv.gz\n"
    )]
    out: Box<str>,

    #[command(flatten)]
    device_args: DeviceArgs,

    #[arg(long, short, help = "Verbosity")]
    verbose: bool,
}

pub fn encode_latent(args: &EncodeArgs) -> anyhow::Result<()> {
    init_logger(args.verbose);
    encode_to_files(&args.data_file, &args.model, &args.out, &args.device_args)?;
    info!("done");
    Ok(())
}

///
/// Encode and reconstruct every image of `data_file` with a saved model
///
/// * `{out}.latent.tsv.gz` - index, label, latent means
/// * `{out}.lnvar.tsv.gz` - index, label, latent log-variances
/// * `{out}.recon.tsv.gz` - reconstructions
///
fn encode_to_files(
    data_file: &str,
    model_header: &str,
    out: &str,
    device_args: &DeviceArgs,
) -> anyhow::Result<()> {
    let mut context = device_args.context()?;
    let model = load_model(model_header, &mut context)?;
    let image_shape = model.image_shape();

    let table = DigitTable::read_csv(data_file, &image_shape)?;
    let mut data = InMemoryData::new(
        table.to_image_tensor(&image_shape, context.device())?,
        &image_shape,
        device_args.seed,
    )?;

    let vae = Vae::build(&model, &context);
    let output = vae.predict(&mut data, device_args.minibatch_size)?;
    let rows: Vec<usize> = (0..table.nrows()).collect();

    mkdir(out)?;
    write_latent(
        &output.z_mean,
        &rows,
        &table.labels,
        &format!("{}.latent.tsv.gz", out),
    )?;
    write_latent(
        &output.z_lnvar,
        &rows,
        &table.labels,
        &format!("{}.lnvar.tsv.gz", out),
    )?;
    write_tensor_tsv(&output.recon, &format!("{}.recon.tsv.gz", out), None, None)?;

    context.finish()?;
    Ok(())
}
