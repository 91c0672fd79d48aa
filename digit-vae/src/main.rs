mod decode_manifold;
mod embed_common;
mod encode_latent;
mod fit_vae;

use decode_manifold::*;
use embed_common::*;
use encode_latent::*;
use fit_vae::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "DIGIT-VAE",
    long_about = "Convolutional variational autoencoder for handwritten digits\n\
		  Data files are comma-separated pixel tables (0-255),\n\
		  one image per row, with an optional leading `label` column."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Train a VAE on digit images",
        long_about = "Train a convolutional VAE in the three stages: \n\
		      (1) Combine the data files and hold out random images\n\
		      (2) Estimate encoder-decoder architecture via SGD\n\
		      (3) Reconstruct and encode the held-out images.\n"
    )]
    Train(TrainArgs),

    #[command(
        about = "Encode digit images with a trained VAE",
        long_about = "Estimate latent means and log-variances of images\n\
		      and reconstruct them with a trained model.\n"
    )]
    Encode(EncodeArgs),

    #[command(
        about = "Decode a 2D latent grid into a manifold picture",
        long_about = "Decode a regular grid of standard normal quantiles\n\
		      in a 2-dimensional latent space and tile the images.\n"
    )]
    Manifold(ManifoldArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Train(args) => {
            fit_vae_model(args)?;
        }
        Commands::Encode(args) => {
            encode_latent(args)?;
        }
        Commands::Manifold(args) => {
            decode_latent_manifold(args)?;
        }
    }

    Ok(())
}
