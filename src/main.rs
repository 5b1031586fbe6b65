use clap::Parser;
use lastmile_agent::{Cli, run};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    run(cli).await
}
