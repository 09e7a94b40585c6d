use rusty_qspi::{BusTransaction, CoSimulation, RevisionConfig, ScenarioConfig, ScenarioRunner, SpiFlashModel};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let revision = match std::env::args().nth(1) {
        Some(path) => RevisionConfig::from_json_file(path)?,
        None => RevisionConfig::tt05(),
    };
    info!(revision = %revision.name, "{}", revision.description);

    let device = SpiFlashModel::new(&revision)?;
    let mut runner = ScenarioRunner::new(&revision, device, ScenarioConfig::default())?;
    let report = runner.run_all();

    for outcome in &report.outcomes {
        info!(
            scenario = outcome.name,
            passed = outcome.passed(),
            transactions = outcome.transactions,
            bus_time_ns = outcome.bus_time_ns,
            "scenario finished"
        );
    }
    if let Some((scenario, err)) = report.first_error() {
        error!(scenario, error = %err, "verification failed");
        std::process::exit(1);
    }
    info!(transactions = report.total_transactions(), "all scenarios passed");

    let ram_base = runner.golden().ram_region().base.value();
    let ram_size = runner.golden().ram_size();
    let (golden, device) = runner.into_parts();
    let mut cosim = CoSimulation::new(&revision, device, golden);
    let reads = vec![
        BusTransaction::read(ram_base, ram_size),
        BusTransaction::quad_read(ram_base, ram_size),
        BusTransaction::read(0x000, 64),
        BusTransaction::quad_read(0x200, 64),
    ];
    let cosim_report = cosim.run(reads, 4).await?;
    info!(
        bus_transactions = cosim_report.bus_transactions,
        debug_frames = cosim_report.debug_frames,
        "co-simulation passed"
    );
    Ok(())
}
