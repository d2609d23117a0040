use std::error::Error;

use env_logger::Builder;
use log::{debug, info, LevelFilter};
use structopt::StructOpt;

use routerd::config::RouterConfig;
use routerd::session::serve;

#[derive(StructOpt, Debug)]
#[structopt(name = "routerd", rename_all = "kebab-case")]
/// BGP-style route server for a single AS
struct Args {
    /// Autonomous System number for this router
    asn: u32,
    /// Neighbor sessions, each as <address>-<relation> (cust, peer, or prov)
    #[structopt(required = true)]
    neighbors: Vec<String>,
    #[structopt(short, parse(from_occurrences))]
    /// Sets the level of logging verbosity
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::from_args();

    let (routerd_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    Builder::new()
        .filter(Some("routerd"), routerd_level)
        .filter(None, other_level)
        .init();

    let config = RouterConfig::new(args.asn, &args.neighbors)?;
    debug!(
        "Router in AS {} with {} neighbors",
        config.asn,
        config.neighbors.len()
    );

    serve(config).await?;
    info!("All neighbor sessions closed, shutting down");
    Ok(())
}
