use anyhow::{anyhow, Result};
use clap::Parser;
use jdk_autofix::cli::{self, Command};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// JDK Migration Autofix Engine
///
/// 升级 Maven 依赖、改写受影响的 Java 代码，默认输出人类可读格式
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 输出 JSON 格式 (默认输出人类可读的 Markdown)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志 (stderr, stdout 留给结果)
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("setting default subscriber failed: {e}"))?;

    cli::handle_command(args.command, args.json)
}
