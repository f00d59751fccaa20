//! 거래일 달력 / 구간 캐시 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 거래일 달력 강제 갱신
//! quant calendar refresh --force
//!
//! # 거래일 여부와 이웃 거래일
//! quant calendar check 2025-01-04
//! quant calendar prev 20250104
//! quant calendar next 20250104
//!
//! # 구간 거래일, 직전 N 거래일
//! quant calendar range 20250101 20250131
//! quant calendar recent 20250110 -n 5
//!
//! # 캐시 점검
//! quant cache stats --domain daily
//! quant cache show --domain daily --entity 000001 -f 20250101 -t 20250131
//! quant cache purge --domain daily --entity 000001
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use quant_cli::commands::{cache, calendar, OutputFormat};
use quant_core::{init_logging, AppConfig, LogConfig};
use quant_data::QuantData;
use tracing::error;

#[derive(Parser)]
#[command(name = "quant")]
#[command(about = "거래일 달력 및 구간 캐시 도구", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    config: String,

    /// 출력 형식 (table, json)
    #[arg(long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 거래일 달력
    #[command(subcommand)]
    Calendar(CalendarCommands),

    /// 구간 캐시
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Subcommand)]
enum CalendarCommands {
    /// 달력 소스에서 스냅샷 갱신
    Refresh {
        /// 오늘 이미 갱신했어도 다시 조회
        #[arg(long, default_value = "false")]
        force: bool,
    },

    /// 거래일 여부 확인
    Check {
        /// 날짜 (YYYYMMDD 또는 YYYY-MM-DD)
        date: String,
    },

    /// 이전 거래일
    Prev { date: String },

    /// 다음 거래일
    Next { date: String },

    /// 구간 내 거래일 목록
    Range { from: String, to: String },

    /// 기준일 직전 거래일 N개
    Recent {
        date: String,

        /// 개수
        #[arg(short, default_value = "5")]
        n: usize,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// 도메인 통계
    Stats {
        #[arg(short, long)]
        domain: String,
    },

    /// 구간 레코드 조회
    Show {
        #[arg(short, long)]
        domain: String,

        /// 엔티티 ID (생략하면 엔티티 없는 레코드)
        #[arg(short, long)]
        entity: Option<String>,

        /// 시작 날짜
        #[arg(short = 'f', long)]
        from: String,

        /// 종료 날짜
        #[arg(short, long)]
        to: String,
    },

    /// 레코드 삭제 (엔티티 생략 시 도메인 전체)
    Purge {
        #[arg(short, long)]
        domain: String,

        #[arg(short, long)]
        entity: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?;
    init_logging(LogConfig::from(&config.logging))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let format = OutputFormat::parse(&cli.format)?;
    let data = QuantData::from_config(&config).await?;

    let result = match cli.command {
        Commands::Calendar(command) => match command {
            CalendarCommands::Refresh { force } => calendar::refresh(&data, force).await,
            CalendarCommands::Check { date } => calendar::check(&data, &date).await,
            CalendarCommands::Prev { date } => calendar::prev(&data, &date).await,
            CalendarCommands::Next { date } => calendar::next(&data, &date).await,
            CalendarCommands::Range { from, to } => calendar::range(&data, &from, &to, format).await,
            CalendarCommands::Recent { date, n } => calendar::recent(&data, &date, n, format).await,
        },
        Commands::Cache(command) => match command {
            CacheCommands::Stats { domain } => cache::stats(&data, &domain, format).await,
            CacheCommands::Show {
                domain,
                entity,
                from,
                to,
            } => cache::show(&data, &domain, entity.as_deref(), &from, &to, format).await,
            CacheCommands::Purge { domain, entity } => {
                cache::purge(&data, &domain, entity.as_deref()).await
            }
        },
    };

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!("명령 실패: {:#}", e);
            Err(e)
        }
    }
}
