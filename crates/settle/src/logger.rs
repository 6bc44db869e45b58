use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 로그 파일 writer 가 플러시되도록 프로그램 종료 시점까지 들고 있어야 한다.
pub struct LogGuards {
    _file: WorkerGuard,
}

/// stdout + 일별 롤링 파일(logs/settle.log.*) 로깅을 초기화한다.
///
/// `RUST_LOG` 환경변수로 필터를 조정할 수 있으며 기본값은 `info`.
pub fn init_tracing() -> LogGuards {
    let file_appender = tracing_appender::rolling::daily("logs", "settle.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    LogGuards { _file: file_guard }
}
