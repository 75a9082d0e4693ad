use std::{error::Error, path::PathBuf, process::ExitCode};

use clap::Parser;
use prjsense_re_campaign::Campaign;
use prjsense_re_hammer::{
    Backend, RunSummary, Session,
    replay::{RecordingBackend, ReplayBackend},
};
use prjsense_re_toolchain::{CommandBackend, Toolchain};
use prjsense_tiledb::Database;
use prjsense_types::SenseDb;

#[derive(Debug, Parser)]
#[command(
    name = "sense_hammer",
    about = "Learn which configuration bits each interconnect net controls."
)]
struct Args {
    campaign: PathBuf,
    /// Bit-sense store; appended to if it already exists.
    out: PathBuf,
    /// Job indices to run; all jobs by default.
    ids: Vec<usize>,
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,
    /// Serve derivations from a recording instead of running the tooling.
    #[arg(long, conflicts_with = "toolchain", required_unless_present = "toolchain")]
    replay: Option<PathBuf>,
    #[arg(long)]
    toolchain: Option<PathBuf>,
    /// Save every derivation made during the run.
    #[arg(long)]
    record: Option<PathBuf>,
    /// Also dump the whole store as JSON.
    #[arg(long)]
    json: Option<PathBuf>,
}

fn run_with<B: Backend>(
    backend: &B,
    args: &Args,
    campaign: &Campaign,
    db: &Database,
    store: &mut SenseDb,
) -> Result<RunSummary, Box<dyn Error>> {
    let heuristics = campaign.heuristics()?;
    let mut session = Session::new(backend, db, &heuristics);
    session.debug = args.debug;
    Ok(campaign.run(&session, &args.ids, store))
}

fn run_recorded<B: Backend>(
    backend: B,
    args: &Args,
    campaign: &Campaign,
    db: &Database,
    store: &mut SenseDb,
) -> Result<RunSummary, Box<dyn Error>> {
    match &args.record {
        Some(path) => {
            let backend = RecordingBackend::new(backend);
            let summary = run_with(&backend, args, campaign, db, store)?;
            backend.into_recording().to_file(path)?;
            Ok(summary)
        }
        None => run_with(&backend, args, campaign, db, store),
    }
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();
    let campaign = Campaign::from_file(&args.campaign)?;
    let db = Database::load(&campaign.database)?;
    let mut store = if args.out.exists() {
        SenseDb::from_file(&args.out)?
    } else {
        SenseDb::new()
    };

    let summary = if let Some(path) = &args.replay {
        run_recorded(ReplayBackend::from_file(path)?, &args, &campaign, &db, &mut store)?
    } else if let Some(path) = &args.toolchain {
        let mut backend = CommandBackend::new(Toolchain::from_file(path)?);
        backend.debug = args.debug;
        run_recorded(backend, &args, &campaign, &db, &mut store)?
    } else {
        unreachable!()
    };

    store.to_file(&args.out)?;
    if let Some(path) = &args.json {
        std::fs::write(path, serde_json::to_string_pretty(&store.to_json())?)?;
    }
    println!("{summary}");
    Ok(ExitCode::from(summary.exit_code() as u8))
}
