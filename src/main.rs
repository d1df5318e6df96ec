use clap::{CommandFactory, FromArgMatches};
use log::{info, warn};
use took::Timer;

use bench_ingest::io::artifact::ArtifactWriter;
use bench_ingest::io::side_channel::SideChannel;
use bench_ingest::pipeline::batch::{expand_sources, run_batch};
use bench_ingest::pipeline::{ingest_file, ingest_solution_file, IngestContextBuilder, Sink};

use crate::cli::Command;

mod cli;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = argfile::expand_args_from(
        std::env::args_os(),
        argfile::parse_fromfile,
        argfile::PREFIX,
    )?;
    let args = cli::ProgramArguments::from_arg_matches(
        &cli::ProgramArguments::command().get_matches_from(args),
    )?;
    info!("{:?}", &args);

    let settings = args.settings()?;
    if let Some(threads) = settings.threads {
        #[cfg(feature = "parallel")]
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
        #[cfg(not(feature = "parallel"))]
        warn!("ignoring threads = {}, built without the parallel feature", threads);
    }

    let load_timer = Timer::new();
    let mut ctx = IngestContextBuilder::default()
        .schema(settings.schema.clone())
        .sink(Sink::Artifacts(ArtifactWriter::new(
            &settings.output_dir,
            settings.overwrite,
        )));
    if let Some(path) = &settings.side_channel {
        let side_channel = SideChannel::load(path)?;
        if side_channel.is_empty() {
            warn!("side channel {} has no rows", path.display());
        }
        info!(
            "side channel with {} rows loaded after {}",
            side_channel.len(),
            load_timer.took()
        );
        ctx = ctx.side_channel(side_channel);
    }
    let ctx = ctx.build()?;

    let paths = expand_sources(&settings.sources)?;
    info!(
        "{} {} files, writing to {}",
        paths.len(),
        settings.schema.domain.name(),
        settings.output_dir.display()
    );

    let report = match &args.command {
        Command::Instances { .. } => run_batch(&paths, |path| ingest_file(path, &ctx)),
        Command::Solutions { .. } => run_batch(&paths, |path| ingest_solution_file(path, &ctx)),
    };

    if args.print_summary_to_stdout {
        println!(
            "{},{},{},{}",
            report.attempted,
            report.succeeded(),
            report.failed(),
            report.skipped_lines
        );
    }

    if !report.is_success() {
        anyhow::bail!("{} of {} files failed", report.failed(), report.attempted);
    }
    Ok(())
}
