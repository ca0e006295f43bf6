//! tracing サブスクライバーの初期化
//!
//! `RUST_LOG` があればそれを優先し、なければ `--verbose` で
//! `artguard=debug`、通常は `artguard=warn` にする。

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "artguard=debug,artguard_common=debug"
    } else {
        "artguard=warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // 二重初期化（テストなど）は無視する
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
