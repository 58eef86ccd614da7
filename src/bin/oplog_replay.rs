use clap::Parser;
use oplog_replay::{MemoryStore, MongoStore, OplogReplayer, ReplayConf, Store};
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[clap(version = env!("CARGO_PKG_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
struct Opts {
    /// configuration file path, command line values override it.
    #[clap(short, long)]
    conf: Option<String>,
    /// mongodb uri to replay oplog against.
    #[clap(short, long)]
    mongo_uri: Option<String>,
    /// captured oplog path, "-" reads from stdin.
    #[clap(short, long)]
    path: Option<String>,
    /// operations to apply per second.
    #[clap(short, long)]
    speed: Option<f64>,
    /// log progress every N applied operations.
    #[clap(long)]
    progress_interval: Option<u64>,
    /// replay into memory only, nothing is written to mongodb.
    #[clap(long)]
    dry_run: bool,
    /// log file path, if not specified, all log information will be output to stdout.
    #[clap(long)]
    log_path: Option<String>,
}

fn main() {
    let opts: Opts = Opts::parse();
    let collector = tracing_subscriber::fmt();
    let (non_blocking, _guard) = match &opts.log_path {
        Some(path) => {
            let path = Path::new(path);
            let dir_name = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .unwrap_or_else(|| OsStr::new("oplog_replay.log"));
            let file_appender = tracing_appender::rolling::daily(dir_name, file_name);
            tracing_appender::non_blocking(file_appender)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };
    collector.with_writer(non_blocking).init();

    if let Err(e) = run(opts) {
        error!(%e, "Replay failed.");
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> Result<(), Box<dyn std::error::Error>> {
    let mut conf = match &opts.conf {
        Some(conf_path) => ReplayConf::from_slice(&std::fs::read(conf_path)?)?,
        None => ReplayConf::new(
            opts.path.clone().unwrap_or_default(),
            opts.mongo_uri.clone().unwrap_or_default(),
            None,
            None,
            None,
        ),
    };
    conf.merge(
        opts.path,
        opts.mongo_uri,
        opts.speed,
        opts.progress_interval,
        opts.dry_run,
    );
    conf.validate()?;
    info!(?conf, "Use the following config to replay oplog.");

    let input: Box<dyn Read> = match conf.get_src_path() {
        "-" => Box::new(BufReader::new(io::stdin())),
        path => Box::new(BufReader::new(File::open(path)?)),
    };

    if conf.is_dry_run() {
        info!("Dry run, operations are applied to an in memory store.");
        let store = replay(&conf, MemoryStore::new(), input)?;
        info!(documents = store.total_count(), "Dry run complete.");
    } else {
        let store = MongoStore::new(conf.get_dst_url())?;
        store.check_connection()?;
        replay(&conf, store, input)?;
    }
    Ok(())
}

fn replay<S: Store>(conf: &ReplayConf, store: S, input: Box<dyn Read>) -> oplog_replay::Result<S> {
    let mut replayer = OplogReplayer::new(store, conf.rate_controller()?)
        .with_progress_interval(conf.get_progress_interval());
    let summary = replayer.replay(input)?;
    info!(
        applied = summary.applied,
        dropped = summary.dropped,
        missing = summary.missing,
        "All oplog entries replayed."
    );
    Ok(replayer.into_store())
}
