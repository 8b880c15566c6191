use decoy::configuration::config::Config;
use decoy::controller::controller_handler::Controller;
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    println!(
        "
██████╗ ███████╗ ██████╗ ██████╗ ██╗   ██╗
██╔══██╗██╔════╝██╔════╝██╔═══██╗╚██╗ ██╔╝
██║  ██║█████╗  ██║     ██║   ██║ ╚████╔╝
██║  ██║██╔══╝  ██║     ██║   ██║  ╚██╔╝
██████╔╝███████╗╚██████╗╚██████╔╝   ██║
╚═════╝ ╚══════╝ ╚═════╝ ╚═════╝    ╚═╝
==========================================
   SSDP device impersonation kit v{}
==========================================
",
        env!("CARGO_PKG_VERSION")
    );

    let config = match Config::from_args() {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration loaded");

    let mut controller = Controller::new(config);
    if let Err(e) = controller.run().await {
        error!("{}, exiting...", e);
        std::process::exit(1);
    }
}
