use std::io;

use clap::Parser;

use relay_server::{run_server, Cli};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level)
        .parse_default_env()
        .init();

    log::info!("Starting chat relay server");
    log::info!("  Model: {}", cli.model_name);
    log::info!("  Temperature: {}", cli.model_temperature);
    log::info!("  Max tokens: {}", cli.model_max_tokens);

    run_server(cli).await
}
