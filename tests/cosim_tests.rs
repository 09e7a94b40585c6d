//! Co-simulation tests
//!
//! The bus and debug channels run concurrently against one device; these
//! tests check that interleaving them changes neither channel's results.


use mocks::*;
use rusty_qspi::components::common::command::BusTransaction;
use rusty_qspi::revision_config::RevisionConfig;
use rusty_qspi::scenario::ScenarioRunner;
use rusty_qspi::{CoSimulation, GoldenMemoryModel, SpiFlashModel};

fn filled_runner() -> ScenarioRunner<SpiFlashModel> {
    let revision = RevisionConfig::tt05();
    let device = SpiFlashModel::new(&revision).unwrap();
    let mut runner = ScenarioRunner::new(&revision, device, quick_config()).unwrap();
    runner.power_on().unwrap();
    runner.smoke().unwrap();
    runner
}

#[cfg(test)]
mod concurrent_channel_tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_and_scans_after_scenarios() {
        let revision = RevisionConfig::tt05();
        let (golden, device) = filled_runner().into_parts();
        let window = golden.ram_window().to_vec();
        let mut cosim = CoSimulation::new(&revision, device, golden);

        let reads = vec![
            BusTransaction::read(0x100, 8),
            BusTransaction::quad_read(0x300, 8),
            BusTransaction::read(0x400, 4),
            BusTransaction::quad_read(0x000, 256),
        ];
        let report = cosim.run(reads, 3).await.unwrap();
        assert_eq!(report.bus_transactions, 4);
        assert_eq!(report.bus_bytes, 8 + 8 + 4 + 256);
        assert_eq!(report.debug_frames, 48);
        assert!(report.bus_time_ns > 0);

        // Read-only traffic leaves the window untouched
        assert_eq!(cosim.golden().ram_window(), window.as_slice());
        let device = cosim.into_device().unwrap();
        assert_eq!(device.ram_window(), window.as_slice());
    }

    #[test]
    fn test_block_on_with_no_bus_traffic() {
        let revision = RevisionConfig::tt05();
        let (golden, device) = filled_runner().into_parts();
        let mut cosim = CoSimulation::new(&revision, device, golden);
        let report = tokio_test::block_on(cosim.run(Vec::new(), 1)).unwrap();
        assert_eq!(report.bus_transactions, 0);
        assert_eq!(report.debug_frames, 16);
        assert_eq!(report.bus_time_ns, 0);
    }

    #[test]
    fn test_debug_fault_surfaces_through_cosim() {
        let revision = RevisionConfig::tt05();
        let mut scenario = MockScenario::powered(Fault::StuckDebugData(0xF));
        scenario.runner.smoke().unwrap();
        let (golden, device) = scenario.runner.into_parts();

        let mut cosim = CoSimulation::new(&revision, device, golden);
        let err = tokio_test::block_on(cosim.run(vec![BusTransaction::read(0x200, 16)], 1))
            .unwrap_err();
        assert!(err.is_debug_mismatch());
    }

    #[test]
    fn test_bus_fault_surfaces_through_cosim() {
        let revision = RevisionConfig::tt05();
        let device = FaultyDevice::new(&revision, Fault::InvertIo(1));
        let golden = GoldenMemoryModel::new(&revision).unwrap();
        let mut cosim = CoSimulation::new(&revision, device, golden);

        let err = tokio_test::block_on(cosim.run(vec![BusTransaction::read(0x200, 4)], 1))
            .unwrap_err();
        assert!(err.is_data_mismatch());
    }

    #[tokio::test]
    async fn test_writes_are_rejected() {
        let revision = RevisionConfig::tt05();
        let (golden, device) = filled_runner().into_parts();
        let mut cosim = CoSimulation::new(&revision, device, golden);
        let err = cosim
            .run(vec![BusTransaction::quad_write(0x100, &[1, 2])], 1)
            .await
            .unwrap_err();
        assert!(err.is_protocol_violation());
    }
}
