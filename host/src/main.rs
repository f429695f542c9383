use clap::Parser;
use host::{Args, HostApp, HostSettings};
use shared::logging::{init_tracing_with_level, log_error, log_shutdown, log_startup, log_success};
use shared::{ClientRole, Component, component_info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    let args = Args::parse();

    init_tracing_with_level(Some(&args.log_level));
    log_startup(Component::Host, &format!("worker script {}", args.script.display()));

    let app = HostApp::start(HostSettings::from(&args)).await?;
    component_info!(
        Component::Host,
        "UI peers connect to {}",
        app.bus_address().url_for(ClientRole::Ui)
    );

    match tokio::signal::ctrl_c().await {
        Ok(()) => log_shutdown(Component::Host, "interrupt received"),
        Err(e) => log_error(Component::Host, "Listening for interrupt", &e),
    }

    if let Err(e) = app.shutdown().await {
        log_error(Component::Host, "Shutdown", &e);
        return Err(e);
    }

    log_success(Component::Host, "Host stopped");
    Ok(())
}
