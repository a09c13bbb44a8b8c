//! ssr-isolate CLI.
//!
//! Single-shot:
//!   ssr-isolate [flags] <chunks-dir> <entry> [props-json]
//!
//! Co-process (framed requests on stdin, framed responses on stdout):
//!   ssr-isolate [flags] --server <chunks-dir>
//!
//! Captured console output goes to stderr in both modes; stdout carries
//! only the rendered body (single-shot) or protocol frames (server).

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::info;
use serde_json::Value;

use ssr_isolate::proto::{read_request, write_response, Status};
use ssr_isolate::{ConsoleLine, IsolateHost, SandboxConfig};

#[derive(Parser, Debug)]
#[command(
    name = "ssr-isolate",
    version,
    about = "Run untrusted SSR bundles in a capability-confined V8 isolate"
)]
struct Cli {
    /// V8 heap ceiling in megabytes (0 = unlimited)
    #[arg(long, value_name = "MB", default_value_t = 64)]
    max_heap_size: usize,

    /// Wall-clock budget per render in milliseconds (0 = unlimited)
    #[arg(long, value_name = "MS", default_value_t = 30_000)]
    timeout: u64,

    /// Origin fetch() may address, e.g. https://api.example.com (repeatable)
    #[arg(long = "allow-origin", value_name = "ORIGIN")]
    allow_origin: Vec<String>,

    /// Serve framed render requests from stdin instead of rendering once
    #[arg(long)]
    server: bool,

    /// Directory containing the built JS chunks; module resolution is
    /// confined to it
    chunks_dir: PathBuf,

    /// Entry module specifier, resolved inside the chunks directory
    /// (single-shot mode)
    entry: Option<String>,

    /// Props JSON passed to the render function (single-shot mode)
    props: Option<String>,
}

fn build_config(cli: &Cli) -> Result<SandboxConfig> {
    let mut config = SandboxConfig::new(&cli.chunks_dir)
        .context("invalid chunks directory")?
        .with_heap_limit(cli.max_heap_size * 1024 * 1024)
        .with_render_timeout(cli.timeout);
    for origin in &cli.allow_origin {
        config = config.allow_origin(origin)?;
    }
    Ok(config)
}

fn emit_console(lines: &[ConsoleLine]) {
    for line in lines {
        eprintln!("[{}] {}", line.level, line.message);
    }
}

async fn run_single_shot(cli: &Cli, entry: &str) -> Result<()> {
    let props: Value = match cli.props.as_deref() {
        Some(json) => serde_json::from_str(json).context("invalid props JSON")?,
        None => serde_json::json!({}),
    };

    let mut host = IsolateHost::new(build_config(cli)?);
    let output = host.render(entry, props).await?;

    emit_console(&output.console);
    println!("{}", output.body);
    Ok(())
}

async fn run_server(cli: &Cli) -> Result<()> {
    let mut host = IsolateHost::new(build_config(cli)?);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut output = stdout.lock();

    info!(
        "serving renders on stdin/stdout (root: {})",
        host.config().root_dir().display()
    );

    while let Some(request) = read_request(&mut input)? {
        let props: Value = if request.props_json.is_empty() {
            serde_json::json!({})
        } else {
            match serde_json::from_str(&request.props_json) {
                Ok(value) => value,
                Err(e) => {
                    write_response(&mut output, Status::Error, &format!("invalid props JSON: {e}"))?;
                    continue;
                }
            }
        };

        match host.render(&request.entry, props).await {
            Ok(rendered) => {
                emit_console(&rendered.console);
                write_response(&mut output, Status::Ok, &rendered.body)?;
            }
            Err(e) => {
                write_response(&mut output, Status::Error, &e.to_string())?;
            }
        }
    }

    info!("stdin closed; shutting down");
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    if cli.server {
        if cli.entry.is_some() || cli.props.is_some() {
            return Err(anyhow!(
                "--server takes only <chunks-dir>; entry and props arrive over stdin"
            ));
        }
        run_server(&cli).await
    } else {
        match cli.entry.clone() {
            Some(entry) => run_single_shot(&cli, &entry).await,
            None => Err(anyhow!(
                "missing <entry>; usage: ssr-isolate [flags] <chunks-dir> <entry> [props-json]"
            )),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(io::stderr(), "ssr-isolate: {e:#}");
            ExitCode::FAILURE
        }
    }
}
