#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::sync::{Arc, OnceLock};

use acinit_clocking::DomainAssembly;
use acinit_common::{
    BoardPreset, ClockSource, ConfigError, DomainSpec, InitProgram, OutputConfig, ReferenceClock,
    SynthConfig,
};
use acinit_sequencer::{
    DoneDestination, InitSystem, InitSystemConfig, PatternedConsumer, ReadyPattern, SimError,
    StartStimulus,
};
use lazy_static::lazy_static;
use rstest::rstest;

static INIT: OnceLock<()> = OnceLock::new();

fn init_test_logger() {
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Period of the `sync` domain in the small test trees.
const SYNC_PS: u64 = 10_000;

lazy_static! {
    /// `sync` runs at 100 MHz from a PLL that locks after 100 ns; `usb` runs
    /// straight off the 50 MHz reference.
    static ref PLL_TREE: Arc<DomainAssembly> = Arc::new(
        DomainAssembly::builder("pll-tree")
            .reference(ReferenceClock::new("clk50", 20_000))
            .synthesizer(
                SynthConfig::new("pll", ClockSource::reference("clk50"))
                    .with_output(OutputConfig::new(2, 1))
                    .with_lock_time(100_000),
            )
            .domain(DomainSpec::new("sync", ClockSource::synthesizer("pll", 0)))
            .domain(DomainSpec::new("usb", ClockSource::reference("clk50")))
            .build()
            .unwrap()
    );

    /// A single PLL-less domain, out of reset from its third edge at 20 ns.
    static ref PLAIN_TREE: Arc<DomainAssembly> = Arc::new(
        DomainAssembly::builder("plain")
            .reference(ReferenceClock::new("clk100", SYNC_PS))
            .domain(DomainSpec::new("sync", ClockSource::reference("clk100")))
            .build()
            .unwrap()
    );
}

fn program(name: &str) -> InitProgram {
    InitProgram::builtin(name).unwrap().clone()
}

fn system(config: InitSystemConfig) -> InitSystem<PatternedConsumer> {
    InitSystem::new(config, PatternedConsumer::always_ready()).unwrap()
}

#[rstest]
#[case(BoardPreset::ArrowDeca)]
#[case(BoardPreset::Qmtech10cl006)]
fn test_dac_program_on_board(#[case] board: BoardPreset) {
    init_test_logger();
    let dac = program("tlv320aic3100-dac");
    let config = InitSystemConfig::for_board(board, dac.clone()).unwrap();
    let mut sim = system(config);
    let report = sim.run_until_done(10_000).unwrap();

    assert_eq!(report.bytes(), dac.packets.total_bytes());
    let collector = report.collect();
    assert!(collector.pending().is_empty());
    let sent: Vec<_> = collector.bus_writes().collect();
    let expected: Vec<_> = dac.packets.iter().filter_map(|p| p.as_bus_write()).collect();
    assert_eq!(sent, expected);
    assert_eq!(sent.len(), 24);

    let start = report.start_recognized_ps.unwrap();
    assert!(report.transfers.iter().all(|t| t.time_ps > start));
    assert!(report.done_ps > report.transfers.last().unwrap().time_ps);

    // Nothing may leave reset before the PLLs feeding it lock.
    let main_lock = sim
        .tree()
        .assembly()
        .synthesizer("main")
        .unwrap()
        .config
        .lock_time_ps;
    assert!(start > main_lock);
    assert_eq!(sim.consumer().accepted().len(), report.bytes());
}

#[test]
fn test_exact_timeline_after_lock() {
    init_test_logger();
    let config = InitSystemConfig::new(PLL_TREE.clone(), program("tlv320aic3100-soft-reset"));
    let mut sim = system(config);
    let report = sim.run_until_done(1_000).unwrap();

    // Lock at 100 ns, reset released at 120 ns, start through two flops,
    // then one byte per cycle.
    assert_eq!(report.start_recognized_ps, Some(140_000));
    let times: Vec<u64> = report.transfers.iter().map(|t| t.time_ps).collect();
    assert_eq!(
        times,
        vec![150_000, 160_000, 170_000, 180_000, 190_000, 200_000]
    );
    let lasts: Vec<usize> = report
        .transfers
        .iter()
        .enumerate()
        .filter(|(_, t)| t.last)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(lasts, vec![2, 5]);
    assert_eq!(report.done_ps, 210_000);
}

#[rstest]
#[case(50_000)]
#[case(50_001)]
#[case(55_000)]
#[case(59_999)]
fn test_start_latency_is_two_to_three_cycles(#[case] rise_ps: u64) {
    init_test_logger();
    let config = InitSystemConfig::new(PLAIN_TREE.clone(), program("tlv320aic3100-soft-reset"))
        .with_start(StartStimulus::held_from(rise_ps));
    let mut sim = system(config);
    let report = sim.run_until_done(1_000).unwrap();

    let latency = report.start_recognized_ps.unwrap() - rise_ps;
    assert!(
        (2 * SYNC_PS..3 * SYNC_PS).contains(&latency),
        "latency {latency} ps"
    );
}

#[test]
fn test_narrow_pulse_between_edges_is_lost() {
    let config = InitSystemConfig::new(PLAIN_TREE.clone(), program("tlv320aic3100-soft-reset"))
        .with_start(StartStimulus::pulse_at(51_000, 5_000));
    let mut sim = system(config);
    let err = sim.run_until_done(100).unwrap_err();
    assert!(matches!(err, SimError::Timeout { bytes: 0, .. }));
    assert!(sim.transfers().is_empty());
}

#[test]
fn test_pulse_of_one_period_is_caught() {
    let config = InitSystemConfig::new(PLAIN_TREE.clone(), program("tlv320aic3100-soft-reset"))
        .with_start(StartStimulus::pulse_at(51_000, SYNC_PS));
    let mut sim = system(config);
    assert_eq!(sim.run_until_done(100).unwrap().bytes(), 6);
}

#[test]
fn test_second_start_edge_is_ignored() {
    let config = InitSystemConfig::new(PLAIN_TREE.clone(), program("tlv320aic3100-soft-reset"))
        .with_start(StartStimulus::levels([
            (30_000, true),
            (60_000, false),
            (80_000, true),
        ]));
    let mut sim = system(config);
    sim.run_until(1_000_000);
    assert!(sim.done());
    assert_eq!(sim.transfers().len(), 6);
}

#[test]
fn test_empty_program_done_with_start() {
    init_test_logger();
    let config = InitSystemConfig::new(PLL_TREE.clone(), program("none"));
    let mut sim = system(config);
    let report = sim.run_until_done(1_000).unwrap();
    assert_eq!(report.bytes(), 0);
    assert_eq!(report.start_recognized_ps, Some(report.done_ps));
}

#[test]
fn test_back_pressure_preserves_stream() {
    let dac = program("tlv320aic3100-dac");
    let config = InitSystemConfig::new(PLAIN_TREE.clone(), dac.clone());
    let mut sim = InitSystem::new(config, PatternedConsumer::new(ReadyPattern::EveryNth(3))).unwrap();
    let report = sim.run_until_done(10_000).unwrap();

    let bytes: Vec<u8> = report.transfers.iter().map(|t| t.payload).collect();
    assert_eq!(bytes, dac.packets.flatten());
    assert!(report
        .transfers
        .windows(2)
        .all(|w| w[1].cycle - w[0].cycle == 3));
}

#[test]
fn test_stalled_consumer_times_out() {
    let config = InitSystemConfig::new(PLAIN_TREE.clone(), program("tlv320aic3100-dac"));
    let mut sim = InitSystem::new(config, PatternedConsumer::new(ReadyPattern::Never)).unwrap();
    match sim.run_until_done(500) {
        Err(SimError::Timeout { domain, cycles, bytes }) => {
            assert_eq!(domain, "sync");
            assert_eq!(cycles, 500);
            assert_eq!(bytes, 0);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(!sim.done());
}

#[test]
fn test_lock_loss_resets_and_reruns() {
    init_test_logger();
    let config = InitSystemConfig::new(PLL_TREE.clone(), program("tlv320aic3100-soft-reset"))
        .with_dropout("pll", 300_000..305_000);
    let mut sim = system(config);

    sim.run_until(250_000);
    assert!(sim.done());
    sim.run_until(300_000);
    assert!(!sim.done(), "done must clear with the domain reset");

    // Relock at 410 ns, release at 430 ns, the held start is seen again.
    sim.run_until(600_000);
    assert!(sim.done());
    let times: Vec<u64> = sim.transfers().iter().map(|t| t.time_ps).collect();
    assert_eq!(
        times,
        vec![
            150_000, 160_000, 170_000, 180_000, 190_000, 200_000, 460_000, 470_000, 480_000,
            490_000, 500_000, 510_000,
        ]
    );
    assert_eq!(sim.consumer().collector().packets().len(), 4);
}

#[rstest]
#[case(DoneDestination::Local, "sync", 210_000)]
// Latched at 210 ns, sampled by usb at 220 ns and 240 ns.
#[case(DoneDestination::resynchronized("usb"), "usb", 240_000)]
fn test_done_destination(
    #[case] destination: DoneDestination,
    #[case] domain: &str,
    #[case] done_ps: u64,
) {
    init_test_logger();
    let config = InitSystemConfig::new(PLL_TREE.clone(), program("tlv320aic3100-soft-reset"))
        .with_done_destination(destination);
    let mut sim = system(config);
    let report = sim.run_until_done(1_000).unwrap();
    assert_eq!(report.done_domain.name(), domain);
    assert_eq!(report.done_ps, done_ps);
}

#[rstest]
#[case(InitSystemConfig::new(PLL_TREE.clone(), program("none")).with_domain("audio"))]
#[case(InitSystemConfig::new(PLL_TREE.clone(), program("none"))
    .with_done_destination(DoneDestination::resynchronized("sound")))]
#[case(InitSystemConfig::new(PLL_TREE.clone(), program("none")).with_domain(""))]
#[case(InitSystemConfig::new(PLL_TREE.clone(), program("none"))
    .with_done_destination(DoneDestination::resynchronized("")))]
fn test_unknown_domains_are_rejected(#[case] config: InitSystemConfig) {
    let err = InitSystem::new(config, PatternedConsumer::always_ready()).unwrap_err();
    assert!(matches!(err, SimError::Config(ConfigError::UnknownDomain(_))));
}

#[test]
fn test_unknown_dropout_target_is_rejected() {
    let config =
        InitSystemConfig::new(PLL_TREE.clone(), program("none")).with_dropout("ghost", 0..1);
    let err = InitSystem::new(config, PatternedConsumer::always_ready()).unwrap_err();
    assert!(matches!(
        err,
        SimError::Config(ConfigError::UnknownSynthesizer(_))
    ));
}
