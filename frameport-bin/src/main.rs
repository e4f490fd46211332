use clap::Parser;
use frameport_cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        eprintln!("{} {e}", console::style("error:").red().bold());
        std::process::exit(1);
    }
}
