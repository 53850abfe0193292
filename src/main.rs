use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use dicom_cpr::{PngPreviewSink, ReformationRequest, RenderSink, SortBy, VolumeLoader, compute_cmpr};
use web_time::Instant;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Ipp,
    Table,
    Instance,
    None,
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Ipp => SortBy::ImagePositionPatient,
            SortArg::Table => SortBy::TablePosition,
            SortArg::Instance => SortBy::InstanceNumber,
            SortArg::None => SortBy::None,
        }
    }
}

/// Curved planar reformation of a DICOM volume
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Reformation request (JSON)
    request: PathBuf,

    /// Write the response here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for PNG previews, used when the request asks to render
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Slice ordering of the DICOM series
    #[arg(long, value_enum, default_value = "ipp")]
    sort_by: SortArg,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    let request: ReformationRequest = serde_json::from_str(&fs::read_to_string(&cli.request)?)?;
    let loader = VolumeLoader::new(cli.sort_by.into());
    let preview = cli.preview_dir.map(PngPreviewSink::new);
    let sink = preview.as_ref().map(|sink| sink as &dyn RenderSink);

    let result = compute_cmpr(&request, &loader, sink)?;
    let payload = serde_json::to_string(&result.to_payload())?;
    match cli.output {
        Some(path) => {
            fs::write(&path, payload)?;
            log::info!("Wrote response to {}", path.display());
        }
        None => println!("{payload}"),
    }

    log::info!("Finished in {:?}", start.elapsed());
    Ok(())
}
