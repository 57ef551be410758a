//! End-to-end co-simulation against fake Spike and RTL processes.
//!
//! Test images are plain text: one commit per line, the lines of a commit
//! joined with `;`. The fake Spike prints one image line per step on stderr;
//! RTL commands print the whole log on stdout.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use friscv::compare::{ComparePolicy, Comparator, DivergenceKind, Facet};
use friscv::rtl::RtlCommand;
use friscv::runner::{BatchConfig, TestStatus, run_batch};
use friscv::session::{RtlSource, SessionConfig, run_session};
use friscv::source::{EndReason, Side};
use friscv::spike::SpikeConfig;
use friscv::{Error, RunError};
use libtest_mimic::{Arguments, Failed, Trial};
use tempfile::TempDir;


fn main() {
    let mut args = Arguments::from_args();
    test_utils::cap_threads(&mut args);

    let trials = vec![
        Trial::test("cosim_agreement", || run_agreement()),
        Trial::test("cosim_register_divergence", || run_register_divergence()),
        Trial::test("cosim_rtl_longer", || run_rtl_longer()),
        Trial::test("cosim_rtl_crash", || run_rtl_crash()),
        Trial::test("cosim_batch_order", || run_batch_order()),
    ];

    libtest_mimic::run(&args, trials).exit();
}

const FAKE_SPIKE: &str = r#"
for image; do :; done
exec 3< "$image"
while read -r cmd; do
    [ "$cmd" = q ] && exit 0
    IFS= read -r commit <&3 || exit 0
    printf '(spike) %s\n' "$commit" | tr ';' '\n' >&2
done
"#;

const PROGRAM: &str = "\
core   0: 0x80000000 (0x00a00093) li ra, 10;x1  = 0x0000000a
core   0: 0x80000004 (0x00108113) addi sp, ra, 1;x2  = 0x0000000b
core   0: 0x80000008 (0x00212023) sw sp, 0(sp);store: addr=0x0000000b data=0x0000000b
";

/// Print `<image><suffix>` as a commit log.
fn rtl_printing(suffix: &str) -> RtlCommand {
    RtlCommand::new(format!("tr ';' '\\n' < {{image}}{suffix}"))
}

struct Fixture {
    dir: TempDir,
    spike: PathBuf,
}

impl Fixture {
    fn new() -> Result<Self, Failed> {
        let dir = tempfile::tempdir().map_err(|e| Failed::from(format!("tempdir: {e}")))?;
        let spike = dir.path().join("spike");
        test_utils::write_script(&spike, FAKE_SPIKE)
            .map_err(|e| Failed::from(format!("spike script: {e}")))?;
        Ok(Self { dir, spike })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, name: &str, text: &str) -> Result<PathBuf, Failed> {
        let path = self.path().join(name);
        fs::write(&path, text).map_err(|e| Failed::from(format!("{name}: {e}")))?;
        Ok(path)
    }

    fn session(&self, policy: ComparePolicy, rtl: RtlSource) -> SessionConfig {
        let spike = SpikeConfig::default()
            .with_path(&self.spike)
            .with_drain_settle(Duration::from_millis(50));
        let comparator = Comparator::new(policy).with_timeout(Duration::from_secs(2));
        SessionConfig::new(spike, comparator).with_rtl(rtl)
    }
}

fn ensure(cond: bool, message: impl Into<String>) -> Result<(), Failed> {
    if cond { Ok(()) } else { Err(Failed::from(message.into())) }
}

fn run_agreement() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    let image = fixture.write("alu.img", PROGRAM)?;
    let session = fixture.session(ComparePolicy::default(), RtlSource::Command(rtl_printing("")));

    let result = run_session(&image, &session).map_err(|e| Failed::from(e.to_string()))?;
    ensure(result.passed(), format!("divergences: {:?}", result.divergences))?;
    ensure(result.compared == 3, format!("compared {}", result.compared))?;
    ensure(result.reference_end == Some(EndReason::Finished), "reference end")?;
    ensure(result.rtl_end == Some(EndReason::Finished), "RTL end")
}

fn run_register_divergence() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    let image = fixture.write("alu.img", PROGRAM)?;
    let traces = fixture.path().join("traces");
    fs::create_dir(&traces).map_err(|e| Failed::from(e.to_string()))?;
    fs::write(
        traces.join("alu.log"),
        PROGRAM.replace("x2  = 0x0000000b", "x2  = 0x0000000c").replace(';', "\n"),
    )
    .map_err(|e| Failed::from(e.to_string()))?;

    let session = fixture.session(ComparePolicy::default(), RtlSource::TraceDir(traces.clone()));
    let result = run_session(&image, &session).map_err(|e| Failed::from(e.to_string()))?;
    let div = result.first_divergence().ok_or("no divergence")?;
    ensure(div.index == 1, format!("index {}", div.index))?;
    ensure(div.kind == DivergenceKind::Mismatch, format!("kind {}", div.kind))?;
    ensure(div.facets == vec![Facet::Registers], format!("facets {:?}", div.facets))?;

    let ignoring = ComparePolicy::default().with_ignored_registers([2]);
    let session = fixture.session(ignoring, RtlSource::TraceDir(traces));
    let result = run_session(&image, &session).map_err(|e| Failed::from(e.to_string()))?;
    ensure(result.passed(), "ignored register still compared")
}

fn run_rtl_longer() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    let image = fixture.write("loop.img", PROGRAM)?;
    fixture.write(
        "loop.img.rtl",
        &format!("{PROGRAM}core   0: 0x8000000c (0x00000013) nop\n"),
    )?;

    let session = fixture.session(ComparePolicy::default(), RtlSource::Command(rtl_printing(".rtl")));
    let result = run_session(&image, &session).map_err(|e| Failed::from(e.to_string()))?;
    let div = result.first_divergence().ok_or("no divergence")?;
    ensure(
        div.kind == DivergenceKind::ReferenceFinishedFirst,
        format!("kind {}", div.kind),
    )?;
    ensure(div.index == 3 && div.extra == Some(1), format!("{div:?}"))?;

    let tolerant = ComparePolicy::default().with_tolerance(1);
    let session = fixture.session(tolerant, RtlSource::Command(rtl_printing(".rtl")));
    let result = run_session(&image, &session).map_err(|e| Failed::from(e.to_string()))?;
    ensure(result.passed(), format!("divergences: {:?}", result.divergences))?;
    ensure(result.tolerated == 1, format!("tolerated {}", result.tolerated))
}

fn run_rtl_crash() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    let image = fixture.write("crash.img", PROGRAM)?;
    let rtl = RtlCommand::new("tr ';' '\\n' < {image}; exit 2");
    let session = fixture.session(ComparePolicy::default(), RtlSource::Command(rtl));

    match run_session(&image, &session) {
        Err(Error::Run(RunError::Terminated { side, reason })) => {
            ensure(side == Side::Rtl, format!("side {side}"))?;
            ensure(
                reason == EndReason::Exited { code: Some(2) },
                format!("reason {reason}"),
            )
        }
        Err(other) => Err(Failed::from(format!("unexpected error: {other}"))),
        Ok(result) => Err(Failed::from(format!("crash accepted: {result:?}"))),
    }
}

fn run_batch_order() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    let good = fixture.write("a_good.img", PROGRAM)?;
    let bad = fixture.write("b_bad.img", PROGRAM)?;
    let missing = fixture.path().join("c_missing.img");
    fixture.write("a_good.img.rtl", PROGRAM)?;
    fixture.write("b_bad.img.rtl", &PROGRAM.replace("0x80000008", "0x80000010"))?;

    let session = fixture.session(ComparePolicy::default(), RtlSource::Command(rtl_printing(".rtl")));
    let images = vec![good, bad, missing];
    let results = run_batch(&images, &session, &BatchConfig::default().with_jobs(3), |_| {})
        .map_err(|e| Failed::from(e.to_string()))?;

    let statuses: Vec<_> = results.iter().map(|r| (r.name.as_str(), r.status)).collect();
    ensure(
        statuses
            == vec![
                ("a_good.img", TestStatus::Pass),
                ("b_bad.img", TestStatus::Fail),
                ("c_missing.img", TestStatus::Error),
            ],
        format!("statuses {statuses:?}"),
    )?;
    let detail = results[1].detail.as_deref().unwrap_or_default();
    ensure(detail.contains("instruction 2"), format!("detail {detail}"))
}
