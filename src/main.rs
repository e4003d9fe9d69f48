use clap::Parser;
use log::debug;

use imsim::Opts;
use imsim::cli::SubCommandExtend;
use imsim::config::SubCommand;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    debug!("config dir: {}", opts.conf_dir.path().display());

    match &opts.subcmd {
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::Search(config) => config.run(&opts).await,
        SubCommand::Classify(config) => config.run(&opts).await,
        SubCommand::Compare(config) => config.run(&opts).await,
    }
}
