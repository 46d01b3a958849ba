//! # Bravo CLI
//!
//! Bravo 机械臂状态查询与限位校正命令行工具。
//!
//! 真实串口/UDP 后端属于传输实现的事务；本工具针对内置机械臂模拟器
//! 运行，用于演示与验证状态引擎：
//!
//! ```bash
//! # 打印启动期状态（身份、限位、心跳频率）
//! bravo-cli status
//!
//! # 持续打印实时遥测，Ctrl-C 退出
//! bravo-cli watch --interval-ms 500
//!
//! # 校正限位直到与配置收敛
//! bravo-cli check-limits --config bravo_limits.yaml
//! ```

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bravo_driver::{BravoDriver, MockTransport};
use bravo_protocol::PacketId;
use bravo_status::{
    BravoStatus, CancelToken, DesiredLimits, LimitReconciler, ReconcileError, ReconcilePolicy,
    joint_for_device,
};

/// Bravo CLI - 机械臂状态与限位工具
#[derive(Parser, Debug)]
#[command(name = "bravo-cli")]
#[command(about = "Status polling and limit reconciliation for the Bravo manipulator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 查询并打印启动期状态
    Status,

    /// 持续打印实时遥测（Ctrl-C 退出）
    Watch {
        /// 快照打印间隔（毫秒）
        #[arg(short, long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// 按配置校正关节限位直到收敛
    CheckLimits {
        /// 期望限位 YAML 文件路径
        #[arg(short, long)]
        config: String,

        /// 最大尝试次数
        #[arg(long, default_value_t = 30)]
        max_attempts: u32,

        /// 两次尝试之间的间隔（毫秒）
        #[arg(long, default_value_t = 1000)]
        retry_interval_ms: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Status => run_status(),
        Commands::Watch { interval_ms } => run_watch(interval_ms),
        Commands::CheckLimits {
            config,
            max_attempts,
            retry_interval_ms,
        } => run_check_limits(&config, max_attempts, retry_interval_ms),
    }
}

/// 连接模拟器并完成启动期扫描
fn open_session() -> Result<(Arc<BravoDriver>, BravoStatus)> {
    let (transport, _handle) = MockTransport::simulated();
    let driver = Arc::new(BravoDriver::new(transport));
    driver.connect().context("Failed to connect driver")?;
    let status =
        BravoStatus::with_defaults(driver.clone()).context("Failed to start status session")?;
    Ok((driver, status))
}

/// 安装 Ctrl-C 处理：触发取消令牌
fn install_ctrlc(cancel: &CancelToken) -> Result<()> {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl-C received, shutting down");
        cancel.cancel();
    })
    .context("Failed to install Ctrl-C handler")
}

fn print_snapshot(status: &BravoStatus, filter: impl Fn(PacketId) -> bool) {
    for (device, properties) in status.snapshot() {
        let name = joint_for_device(device).unwrap_or("unknown");
        println!("{name} ({device:?}):");
        for (packet_id, value) in &properties {
            if filter(*packet_id) {
                println!("    {packet_id:?}: {value}");
            }
        }
    }
}

fn run_status() -> Result<()> {
    let (_driver, status) = open_session()?;
    // 给设备应答与缓存更新留出时间
    std::thread::sleep(Duration::from_millis(300));

    print_snapshot(&status, |id| id.is_startup());
    let metrics = status.cache().metrics();
    println!(
        "\n{} updates, {} decode errors, {} unknown-device drops",
        metrics.updates, metrics.decode_errors, metrics.unknown_device
    );
    status.stop();
    Ok(())
}

fn run_watch(interval_ms: u64) -> Result<()> {
    let (_driver, status) = open_session()?;
    status.start().context("Failed to start realtime polling")?;

    let cancel = CancelToken::new();
    install_ctrlc(&cancel)?;

    while !cancel.is_cancelled() {
        std::thread::sleep(Duration::from_millis(interval_ms));
        println!("---");
        print_snapshot(&status, |id| id.is_realtime());
    }

    status.stop();
    Ok(())
}

fn run_check_limits(config: &str, max_attempts: u32, retry_interval_ms: u64) -> Result<()> {
    let desired = DesiredLimits::from_yaml_file(config)
        .with_context(|| format!("Failed to load limits config {config}"))?;

    let (driver, status) = open_session()?;
    let cancel = CancelToken::new();
    install_ctrlc(&cancel)?;

    let reconciler = LimitReconciler::new(driver.clone(), status.cache().clone(), desired);
    let policy = ReconcilePolicy {
        max_attempts,
        retry_interval: Duration::from_millis(retry_interval_ms),
    };

    let outcome = reconciler.run(&policy, &cancel);
    status.stop();

    match outcome {
        Ok(report) => {
            if !report.skipped_joints.is_empty() {
                println!(
                    "Warning: joints not in the device map were skipped: {:?}",
                    report.skipped_joints
                );
            }
            println!("All declared limits converged. Manipulate away!");
            Ok(())
        },
        Err(ReconcileError::NotConverged { attempts }) => {
            bail!("Limits did not converge after {attempts} attempts")
        },
        Err(e) => Err(e.into()),
    }
}
