use filebuffer::FileBuffer;
use fpng_decode_rs::{rgb888_to_rgb565, DecodeContext, DecodeOptions, FpngDecodeError};
use log::info;
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "fpngd", about = "Decode PNG files written by fpng to raw pixels")]
struct FpngdParams {
    input: PathBuf,
    output: Option<PathBuf>,
    #[structopt(short, long)]
    width: u32,
    #[structopt(long)]
    height: u32,
    /// Only decode, don't write the pixels
    #[structopt(short)]
    simulate: bool,
    /// Write little-endian RGB565 instead of RGB888
    #[structopt(long)]
    rgb565: bool,
    #[structopt(long)]
    no_speculative: bool,
    #[structopt(long)]
    verify_crc: bool,
    #[structopt(long)]
    no_stored: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let params: FpngdParams = FpngdParams::from_args();

    let mut context = DecodeContext::with_options(DecodeOptions {
        speculative_decode: !params.no_speculative,
        verify_chunk_crc: params.verify_crc,
        allow_stored_blocks: !params.no_stored,
    });
    context.init();

    let image = FileBuffer::open(&params.input)?;

    let start = Instant::now();
    let pixels = match context.decode_to_vec(&image[..], params.width, params.height) {
        Ok(pixels) => pixels,
        Err(FpngDecodeError::NotFpng) => {
            return Err(format!(
                "{} was not written by fpng, decode it with a general purpose PNG decoder",
                params.input.display()
            )
            .into());
        }
        Err(err) => return Err(err.into()),
    };
    let elapsed = start.elapsed();

    info!(
        "Decoded {}x{} pixels in {:.2}ms ({:.2} MB/s)",
        params.width,
        params.height,
        elapsed.as_secs_f64() * 1000.0,
        pixels.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1_000_000.0
    );

    if params.simulate {
        return Ok(());
    }

    let output = params
        .output
        .unwrap_or_else(|| params.input.with_extension("rgb"));
    let mut write_file = BufWriter::new(File::create(&output)?);

    if params.rgb565 {
        for pixel in rgb888_to_rgb565(&pixels) {
            write_file.write_all(&pixel.to_le_bytes())?;
        }
    } else {
        write_file.write_all(&pixels)?;
    }
    write_file.flush()?;

    Ok(())
}
