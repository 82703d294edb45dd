use clap::Parser;
use code_exec::{ResourceLimits, ServiceConfig};
use code_exec_server::{create_app, run_server};
use std::{net::SocketAddr, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to listen on
    #[arg(short, long, env = "CODE_EXEC_ADDR", default_value = "0.0.0.0:3000")]
    addr: SocketAddr,

    /// Maximum number of concurrent executions
    #[arg(short, long, env = "CODE_EXEC_MAX_CONCURRENT", default_value = "10")]
    max_concurrent: usize,

    /// How long a request may wait for an execution slot, in milliseconds
    #[arg(long, env = "CODE_EXEC_QUEUE_TIMEOUT_MS", default_value = "5000")]
    queue_timeout_ms: u64,

    /// Wall-clock limit per request, in milliseconds
    #[arg(long, env = "CODE_EXEC_TIME_LIMIT_MS", default_value = "10000")]
    time_limit_ms: u64,

    /// Memory limit in bytes
    #[arg(long, env = "CODE_EXEC_MEMORY_LIMIT", default_value = "268435456")] // 256MB
    memory_limit: u64,

    /// CPU time limit per process in seconds
    #[arg(long, env = "CODE_EXEC_CPU_TIME_LIMIT", default_value = "10")]
    cpu_time_limit: u64,

    /// Output limit per stream in bytes
    #[arg(long, env = "CODE_EXEC_OUTPUT_LIMIT", default_value = "10000")]
    output_limit: usize,

    /// File size limit in bytes
    #[arg(long, env = "CODE_EXEC_FILE_SIZE_LIMIT", default_value = "10485760")] // 10MB
    file_size_limit: u64,

    /// Processes and threads per sandboxed program
    #[arg(long, env = "CODE_EXEC_MAX_PROCESSES", default_value = "256")]
    max_processes: u64,

    /// Largest accepted source text in bytes
    #[arg(long, env = "CODE_EXEC_MAX_CODE_SIZE", default_value = "50000")]
    max_code_size: usize,

    /// Run toolchains without fresh user and network namespaces
    #[arg(long, env = "CODE_EXEC_NO_NETWORK_ISOLATION")]
    no_network_isolation: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = ServiceConfig {
        max_concurrent: args.max_concurrent,
        queue_timeout: Duration::from_millis(args.queue_timeout_ms),
        limits: ResourceLimits {
            time_limit: Duration::from_millis(args.time_limit_ms),
            cpu_time: args.cpu_time_limit,
            memory: args.memory_limit,
            output_limit: args.output_limit,
            file_size: args.file_size_limit,
            processes: args.max_processes,
            max_code_size: args.max_code_size,
            isolate_network: !args.no_network_isolation,
            ..ResourceLimits::default()
        },
    };

    let app = create_app(config);
    run_server(app, args.addr).await?;

    Ok(())
}
