//! podstats entry point.

use podstats_lib::cli::{self, Cli};
use podstats_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
