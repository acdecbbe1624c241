use std::path::PathBuf;
use std::process::exit;
use clap::Parser;
use tracing::{error, warn, Level};
use bruker2bids::{Conversion, Mp2rageParams, ScanFiles, SequenceMode};


#[derive(Parser, Debug)]
/// Build BIDS sidecar JSON from the parameter files of a Bruker ParaVision scan
struct Args {

    /// scan directory holding `method`, `acqp` and `pdata/1/{visu_pars,reco}`
    scan_dir:PathBuf,

    /// output directory for the sidecar. MP2RAGE and MESE sidecars are written to its
    /// parent directory
    output_dir:PathBuf,

    /// sequence family: MP2RAGE, MESE, RARE or T2STAR. Anything else writes the sidecar
    /// without sequence specific changes.
    /// Example: `--mode rare`
    #[clap(short,long,default_value = "MP2RAGE")]
    mode:String,

    /// JSON file with the MP2RAGE timing (TR, MP2RAGE_TR, ETL, α₁, α₂, TI₁, TI₂).
    /// Only used in MP2RAGE mode, where it produces one sidecar per inversion
    #[clap(long, alias = "mp2_file")]
    mp2_file:Option<PathBuf>,

    /// sidecar file name.
    /// Example: `--json-name sub-01_ses-01_MP2RAGE.json`
    #[clap(long, alias = "json_name")]
    json_name:Option<String>,

    /// print debug messages
    #[clap(short,long)]
    verbose:bool,
}

fn run(args:&Args) -> bruker2bids::Result<Vec<PathBuf>> {

    let mode = args.mode.parse::<SequenceMode>().unwrap_or_else(|e| {
        warn!("{e}, no sequence specific adaptation is applied");
        SequenceMode::Plain
    });

    let scan = ScanFiles::locate(&args.scan_dir)?.parse()?;

    let mut conversion = Conversion::new(mode);
    if let Some(name) = &args.json_name {
        conversion = conversion.with_json_name(name);
    }
    match (&args.mp2_file, mode) {
        (Some(mp2_file), SequenceMode::Mp2rage) => {
            conversion = conversion.with_mp2rage(Mp2rageParams::from_file(mp2_file)?);
        }
        (None, SequenceMode::Mp2rage) => warn!("no MP2RAGE parameter file given, writing a single sidecar"),
        _ => {}
    }

    conversion.write(&scan, &args.output_dir)
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    }else {
        Level::INFO
    };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not set up logging: {e}");
    }

    match run(&args) {
        Ok(written) => {
            for path in written {
                println!("{}", path.display());
            }
        }
        Err(err) => {
            error!("{err}");
            exit(1);
        }
    }
}
