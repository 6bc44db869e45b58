use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre;
use exchanges::{ExchangeApi, UpbitClient};
use settle::context::AppContext;
use sheets::{RecordStore, SheetsClient};
use structopt::StructOpt;
use tracing::{error, info};

// lib.rs에서 자동으로 dotenv가 로드됨

/// 입금 폴링 주기.
const DEPOSIT_POLL_SECS: u64 = 30;
/// 주문 상태 폴링 주기.
const ORDER_POLL_SECS: u64 = 300;

#[derive(Debug, StructOpt)]
#[structopt(name = "settle", about = "송금 정산 · 자동 매도 봇")]
enum Command {
    /// 웹훅 서버와 폴링 루프 실행
    Run,
    /// 업비트 연결 확인 (현재가/잔고/최근 내역)
    CheckUpbit,
    /// 구글 시트 연결 확인 (당일작업 행 수)
    CheckSheet,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let _guards = settle::logger::init_tracing();

    let cmd = Command::from_args();
    match cmd {
        Command::Run => run_bot().await,
        Command::CheckUpbit => check_upbit().await,
        Command::CheckSheet => check_sheet().await,
    }
}

async fn run_bot() -> eyre::Result<()> {
    let ctx = AppContext::from_env()?;

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let server_ctx = ctx.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = settle::server::start_server(server_ctx, port).await {
            error!("웹훅 서버 실행 중 오류 발생: {}", e);
        }
    });

    let deposit_ctx = ctx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(DEPOSIT_POLL_SECS));
        loop {
            interval.tick().await;
            deposit_ctx.poll_deposits().await;
        }
    });

    let order_ctx = ctx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(ORDER_POLL_SECS));
        loop {
            interval.tick().await;
            order_ctx.poll_orders().await;
        }
    });

    info!(port, "봇이 시작되었습니다");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("종료 신호 수신");
            ctx.shutdown().await;
        }
        result = server_handle => {
            if let Err(e) = result {
                error!("서버 태스크 오류: {:?}", e);
            }
        }
    }

    Ok(())
}

/// 업비트 자격/연결 점검
async fn check_upbit() -> eyre::Result<()> {
    let client = UpbitClient::from_env()?;

    let price = client.current_price("KRW-USDT").await?;
    println!("KRW-USDT 현재가: {:?}", price);

    let balance = client.balance("USDT").await?;
    println!("USDT 잔고: {:.2}", balance);

    let deposits = client.list_deposits("USDT", "ACCEPTED", 5).await?;
    println!("최근 USDT 입금 {}건", deposits.len());
    for d in &deposits {
        println!("  {} {} USDT ({:?})", d.uuid, d.amount, d.done_at);
    }

    let orders = client.list_orders("KRW-USDT", "done", 5).await?;
    println!("최근 체결 주문 {}건", orders.len());

    let withdrawals = client.list_withdrawals("KRW", "DONE", 5).await?;
    println!("최근 KRW 출금 {}건", withdrawals.len());

    Ok(())
}

/// 구글 시트 자격/연결 점검
async fn check_sheet() -> eyre::Result<()> {
    let client = SheetsClient::from_env()?;

    let rows = client
        .read_range("당일작업!A:T")
        .await
        .map_err(|e| eyre::eyre!("당일작업 시트 읽기 실패: {}", e))?;
    println!("당일작업 시트 행 수: {}", rows.len());

    Ok(())
}
