//! Command implementations.
//!
//! Each submodule handles one CLI command.

mod batch;
mod check;
mod compile;
mod image;
mod run;

use std::path::PathBuf;
use std::time::Duration;

use friscv::compare::{Comparator, Scope, parse_number, parse_register_list, parse_regions};
use friscv::config::ToolchainConfig;
use friscv::rtl::RtlCommand;
use friscv::session::{RtlSource, SessionConfig};
use friscv::{ConfigError, Error};

use crate::cli::{Cli, Commands, EXIT_FAILURE, SessionArgs};
use crate::terminal;

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    let config = match ToolchainConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            terminal::error(&e.to_string());
            return EXIT_FAILURE;
        }
    };

    match &cli.command {
        Commands::Run { .. } => handle_run(cli, &config),
        Commands::Batch { .. } => handle_batch(cli, &config),
        Commands::Image { .. } => handle_image(cli),
        Commands::Compile { .. } => handle_compile(cli, &config),
        Commands::Check { .. } => handle_check(cli, &config),
    }
}

fn handle_run(cli: &Cli, config: &ToolchainConfig) -> i32 {
    let Commands::Run {
        image,
        session,
        format,
    } = &cli.command
    else {
        unreachable!("run command variant mismatch");
    };

    let session = match session_config(session, config) {
        Ok(session) => session,
        Err(e) => {
            terminal::error(&e.to_string());
            return EXIT_FAILURE;
        }
    };
    run::cmd_run(image, &session, *format, cli.silent)
}

fn handle_batch(cli: &Cli, config: &ToolchainConfig) -> i32 {
    let Commands::Batch {
        paths,
        jobs,
        sequential,
        extension,
        session,
        format,
    } = &cli.command
    else {
        unreachable!("batch command variant mismatch");
    };

    let session = match session_config(session, config) {
        Ok(session) => session,
        Err(e) => {
            terminal::error(&e.to_string());
            return EXIT_FAILURE;
        }
    };
    let batch = friscv::runner::BatchConfig::default()
        .with_jobs(jobs.or(config.jobs).unwrap_or(0))
        .with_sequential(*sequential)
        .with_extension(extension);
    batch::cmd_batch(paths, &session, &batch, *format, cli.silent)
}

fn handle_image(cli: &Cli) -> i32 {
    let Commands::Image {
        files,
        output,
        sv,
        words,
    } = &cli.command
    else {
        unreachable!("image command variant mismatch");
    };

    image::cmd_image(files, output.as_deref(), *sv, *words)
}

fn handle_compile(cli: &Cli, config: &ToolchainConfig) -> i32 {
    let Commands::Compile {
        src_dir,
        output,
        script,
        riscv_tools_path,
    } = &cli.command
    else {
        unreachable!("compile command variant mismatch");
    };

    let Some(script) = script.as_ref().or(config.build_script.as_ref()) else {
        terminal::error("no build script: pass --script or set build_script in the configuration");
        return EXIT_FAILURE;
    };
    let riscv_path = riscv_tools_path
        .as_ref()
        .or(config.riscv_tools_path.as_ref());
    compile::cmd_compile(script, src_dir, output, riscv_path.map(PathBuf::as_path), cli.silent)
}

fn handle_check(cli: &Cli, config: &ToolchainConfig) -> i32 {
    let Commands::Check {
        spike_path,
        vivado_path,
        no_vivado,
        force,
    } = &cli.command
    else {
        unreachable!("check command variant mismatch");
    };

    let vivado_path = vivado_path.as_ref().or(config.rtl.vivado_path.as_ref());
    check::cmd_check(
        spike_path.as_deref(),
        (!*no_vivado).then_some(vivado_path.map(PathBuf::as_path)),
        &config.supported_versions,
        *force,
    )
}

/// Merge command-line options over the configuration file.
fn session_config(args: &SessionArgs, config: &ToolchainConfig) -> Result<SessionConfig, Error> {
    let mut spike = config.spike_config()?;
    if let Some(path) = &args.spike {
        spike = spike.with_path(path);
    }
    if let Some(isa) = &args.isa {
        spike = spike.with_isa(isa);
    }
    if let Some(map) = &args.mem_map {
        spike = spike.with_memory_map(map);
    }
    if let Some(pc) = &args.start_pc {
        let pc = parse_number(pc).ok_or_else(|| ConfigError::Invalid {
            what: "start PC",
            value: pc.clone(),
        })?;
        spike = spike.with_start_pc(Some(pc));
    }

    let mut policy = config.compare_policy()?;
    if let Some(scope) = &args.compare {
        policy = policy.with_scope(scope.parse::<Scope>()?);
    }
    if let Some(list) = &args.ignore_regs {
        policy = policy.with_ignored_registers(parse_register_list(list)?);
    }
    if let Some(list) = &args.mem_regions {
        policy = policy.with_memory_regions(parse_regions(list)?);
    }
    if let Some(tolerance) = args.tolerance {
        policy = policy.with_tolerance(tolerance);
    }
    if args.stop_on_error {
        policy = policy.with_stop_on_first(true);
    }

    let timeout = args
        .timeout_ms
        .map_or_else(|| config.timeout(), Duration::from_millis);
    let comparator = Comparator::new(policy)
        .with_timeout(timeout)
        .with_max_commits(args.max_commits.or(config.max_commits));

    let rtl = match (&args.rtl_cmd, &args.rtl_trace) {
        (Some(command), _) => Some(RtlSource::Command(RtlCommand::new(command))),
        (None, Some(dir)) => Some(RtlSource::TraceDir(dir.clone())),
        (None, None) => match (&config.rtl.command, &config.rtl.trace_dir) {
            (Some(command), _) => Some(RtlSource::Command(RtlCommand::new(command))),
            (None, Some(dir)) => Some(RtlSource::TraceDir(dir.clone())),
            (None, None) => None,
        },
    };

    let session = SessionConfig::new(spike, comparator);
    Ok(match rtl {
        Some(rtl) => session.with_rtl(rtl),
        None => session,
    })
}
