//! 시세 집계 서버 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 국내 종목 시세 조회
//! jubot prices -m KR -s 005930,000660,035720
//!
//! # 미국 종목을 10초마다 갱신
//! jubot prices -m US -s AAPL,MSFT,NVDA --watch --interval 10
//!
//! # 서버 상태 확인
//! jubot health --server http://127.0.0.1:3000
//! ```

use clap::{Parser, Subcommand};
use jubot_core::{init_logging, LogConfig, Market};
use std::time::Duration;
use tracing::debug;

mod commands;

use commands::health::check_health;
use commands::prices::{run_prices, PricesConfig};

#[derive(Parser)]
#[command(name = "jubot")]
#[command(about = "Jubot CLI - KIS 시세 집계 서버 클라이언트", long_about = None)]
#[command(version)]
struct Cli {
    /// 로그 레벨 (RUST_LOG가 있으면 무시)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 종목 시세 일괄 조회
    Prices {
        /// 시장 유형 (KR: 한국, US: 미국)
        #[arg(short, long)]
        market: Market,

        /// 종목 코드/심볼 (쉼표로 구분, 예: 005930,000660)
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// 집계 서버 주소
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,

        /// 주기적으로 다시 조회
        #[arg(short, long)]
        watch: bool,

        /// 갱신 주기 (초)
        #[arg(long, default_value = "30")]
        interval: u64,

        /// 최대 재시도 횟수
        #[arg(long, default_value = "3")]
        max_retries: u32,

        /// 시도별 타임아웃 (초)
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },

    /// 서버 상태 확인
    Health {
        /// 집계 서버 주소
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일은 선택 사항
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(LogConfig::new(&cli.log_level).with_target(false))?;

    match cli.command {
        Commands::Prices {
            market,
            symbols,
            server,
            watch,
            interval,
            max_retries,
            timeout_secs,
        } => {
            let config = PricesConfig {
                server,
                market,
                symbols,
                watch: watch.then(|| Duration::from_secs(interval.max(1))),
                max_retries,
                timeout: Duration::from_secs(timeout_secs.max(1)),
            };
            debug!(?config, "Running prices command");
            run_prices(config).await?;
        }

        Commands::Health { server } => {
            check_health(&server).await?;
        }
    }

    Ok(())
}
