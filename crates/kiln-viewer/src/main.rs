mod app;
mod cli;
mod clock;
mod scene;
mod shapes;

use clap::Parser;

use kiln_engine::logging::init_logging;

fn main() -> anyhow::Result<()> {
    let config = cli::Cli::parse().into_config()?;
    init_logging(config.logging.clone());

    log::info!(
        "kiln viewer: {}x{}, {}",
        config.size.0,
        config.size.1,
        match &config.atlas {
            Some(atlas) => format!("atlas {}", atlas.descriptor.display()),
            None => "generated atlas".to_string(),
        }
    );

    app::run(config)
}
