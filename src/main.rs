use artguard::{cli, config, controller, error, history, identity, logging};
use artguard_common::{
    filter_by_date_range, format_file_size, format_timestamp, status_color, Error as HistoryError,
    RecordPatch, ResultRecord, ScanStatus, StatusFilter,
};
use chrono::{Duration as DateDuration, Utc};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use controller::{FetchOutcome, ListController};
use dialoguer::Confirm;
use error::{ArtguardError, Result};
use history::{collect_all, HttpHistoryClient};
use identity::ConfiguredIdentity;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = Config::load()?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }

    match cli.command {
        Commands::Config { set_user_id, set_api_key, set_api_url, show } => {
            if let Some(user_id) = set_user_id {
                config.set_user_id(user_id)?;
                println!("✔ ユーザーIDを保存しました");
            }
            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを保存しました");
            }
            if let Some(url) = set_api_url {
                config.set_api_base_url(url)?;
                println!("✔ APIのURLを保存しました");
            }
            if show {
                println!("設定ファイル: {}", Config::config_path()?.display());
                println!("API URL: {}", config.api_base_url);
                println!(
                    "APIキー: {}",
                    if config.api_key.is_some() { "設定済み" } else { "未設定" }
                );
                println!("ユーザーID: {}", config.user_id.as_deref().unwrap_or("未設定"));
                println!("ページサイズ: {}", config.page_size);
                println!("集計期間: {}日", config.analytics_days);
            }
            return Ok(());
        }

        Commands::Health => {
            let client = HttpHistoryClient::from_config(&config)?;
            let status = client.health().await?;
            println!("✔ {} ({})", status.status, client.base_url());
            if !status.version.is_empty() {
                println!("  version: {}", status.version);
            }
            if !status.message.is_empty() {
                println!("  {}", status.message);
            }
            return Ok(());
        }

        _ => {}
    }

    let client = Arc::new(HttpHistoryClient::from_config(&config)?);
    let controller = ListController::new(
        client.clone(),
        Arc::new(ConfiguredIdentity::from_config(&config)),
        Arc::new(client.classifier()),
        config.page_size,
    );

    match cli.command {
        Commands::History { pages, status, since_days } => {
            println!("🖼  artguard - スキャン履歴\n");

            let pb = spinner("履歴を取得中...");
            let outcome = controller.initialize().await;
            let outcome = match outcome {
                FetchOutcome::Failed(_) => outcome,
                _ => load_pages(&controller, pages).await,
            };
            pb.finish_and_clear();
            check_outcome(outcome)?;

            let mut records = controller.visible_items(&status);
            if let Some(days) = since_days {
                let end = Utc::now().fixed_offset();
                let start = end - DateDuration::days(i64::from(days));
                records = filter_by_date_range(&records, &start, &end)
                    .into_iter()
                    .cloned()
                    .collect();
            }
            print_page_summary(&controller, &records);
        }

        Commands::Search { query, pages } => {
            println!("🔍 artguard - 履歴検索: \"{}\"\n", query.trim());

            controller.resolve_identity().await.map_err(auth_error)?;

            let pb = spinner("検索中...");
            let outcome = match controller.search(&query).await {
                FetchOutcome::Failed(e) => FetchOutcome::Failed(e),
                _ => load_pages(&controller, pages).await,
            };
            pb.finish_and_clear();
            check_outcome(outcome)?;

            print_page_summary(&controller, &controller.visible_items(&StatusFilter::All));
        }

        Commands::Delete { id } => {
            controller.resolve_identity().await.map_err(auth_error)?;
            let ack = controller
                .delete_one(&id)
                .await
                .map_err(|e| not_found(e, &id))?;
            let deleted_id = if ack.deleted_id.is_empty() { &id } else { &ack.deleted_id };
            println!("✔ 削除しました: {}", deleted_id);
        }

        Commands::BatchDelete { ids, yes } => {
            controller.resolve_identity().await.map_err(auth_error)?;

            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("{}件のスキャンを削除しますか？", ids.len()))
                    .default(false)
                    .interact()
                    .map_err(|e| ArtguardError::Prompt(e.to_string()))?;
                if !confirmed {
                    println!("中止しました");
                    return Ok(());
                }
            }

            match controller.delete_batch(&ids).await {
                Ok(deleted) => println!("✔ {}件削除しました", deleted),
                Err(HistoryError::PartialFailure { requested, deleted }) => {
                    println!(
                        "⚠ {}件中{}件だけ削除されました。一覧を取り直してください",
                        requested, deleted
                    );
                    return Err(HistoryError::PartialFailure { requested, deleted }.into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Update { id, description, status } => {
            controller.resolve_identity().await.map_err(auth_error)?;
            let patch = RecordPatch {
                description,
                status: status.map(ScanStatus::from),
                classification: None,
            };
            let record = controller
                .update_one(&id, &patch)
                .await
                .map_err(|e| not_found(e, &id))?;
            println!("✔ 更新しました\n");
            print_record(&record);
        }

        Commands::Analytics { days } => {
            controller.resolve_identity().await.map_err(auth_error)?;
            let days = days.unwrap_or(config.analytics_days);
            let analytics = controller.analytics(days).await?;

            let period = if analytics.period_days > 0 { analytics.period_days } else { days };
            println!("📊 直近{}日間の集計\n", period);
            println!("  スキャン数:   {}", analytics.total_scans);
            println!("  合計サイズ:   {}", format_file_size(analytics.total_bytes));
            let avg_bytes = analytics.avg_bytes.max(0.0).round() as u64;
            println!("  平均サイズ:   {}", format_file_size(avg_bytes));
            println!("  1日あたり:    {:.1}件", analytics.scans_per_day);
        }

        Commands::Reanalyze { id, save } => {
            controller.resolve_identity().await.map_err(auth_error)?;
            let record = controller
                .fetch_one(&id)
                .await
                .map_err(|e| not_found(e, &id))?;

            let pb = spinner("再解析中...");
            let classification = controller.reanalyze(&record).await;
            pb.finish_and_clear();
            let classification = classification?;

            println!(
                "✔ 判定: {} ({})",
                classification.label,
                classification.confidence_percent()
            );
            if let Some(previous) = &record.classification {
                println!("  以前の判定: {} ({})", previous.label, previous.confidence_percent());
            }

            if save {
                let patch = RecordPatch {
                    classification: Some(classification),
                    ..Default::default()
                };
                controller.update_one(&id, &patch).await?;
                println!("✔ 判定結果を保存しました");
            }
        }

        Commands::Export { output, batch_size } => {
            let identity = controller.resolve_identity().await.map_err(auth_error)?;

            let pb = spinner("全履歴を取得中...");
            let records = collect_all(client.as_ref(), &identity.user_id, batch_size).await;
            pb.finish_and_clear();
            let records = records?;

            let json = serde_json::to_string_pretty(&records)?;
            std::fs::write(&output, json)?;
            println!("✔ {}件を保存: {}", records.len(), output.display());
        }

        Commands::Health | Commands::Config { .. } => {}
    }

    Ok(())
}

/// 続きがある限り、合計 `pages` ページになるまで読み込む
async fn load_pages(controller: &ListController, pages: usize) -> FetchOutcome {
    let mut last = FetchOutcome::Skipped;
    for _ in 1..pages.max(1) {
        if !controller.has_more() {
            break;
        }
        last = controller.load_more().await;
        if matches!(last, FetchOutcome::Failed(_)) {
            break;
        }
    }
    last
}

fn check_outcome(outcome: FetchOutcome) -> Result<()> {
    match outcome {
        FetchOutcome::Failed(e) => Err(auth_error(e)),
        _ => Ok(()),
    }
}

fn auth_error(e: HistoryError) -> ArtguardError {
    match e {
        HistoryError::Unauthenticated => ArtguardError::MissingUserId,
        other => other.into(),
    }
}

fn not_found(e: HistoryError, id: &str) -> ArtguardError {
    match e {
        HistoryError::NotFound(_) => ArtguardError::ScanNotFound(id.to_string()),
        other => auth_error(other),
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_page_summary(controller: &ListController, records: &[ResultRecord]) {
    let state = controller.snapshot();

    if records.is_empty() {
        println!("スキャン履歴はありません");
        return;
    }

    for record in records {
        print_record(record);
    }

    let total = state
        .total_count()
        .map(|n| format!(" / 全{}件", n))
        .unwrap_or_default();
    println!("{}件表示{}", records.len(), total);
    if state.has_more() {
        println!("続きがあります（--pages で読み込むページ数を増やせます）");
    }
}

fn print_record(record: &ResultRecord) {
    let verdict = match &record.classification {
        Some(c) => format!("{} ({})", c.label, c.confidence_percent()),
        None => "判定なし".to_string(),
    };
    let timestamp = record
        .display_timestamp()
        .map(format_timestamp)
        .unwrap_or_else(|| "-".to_string());

    println!(
        "[{:<10}] {}  {}",
        record.status,
        record.file_name.as_deref().unwrap_or(&record.id),
        verdict
    );
    println!(
        "    id: {}  {}  {}  ({})",
        record.id,
        format_file_size(record.size_bytes),
        timestamp,
        status_color(&record.status)
    );
    if let Some(description) = record.description.as_deref().filter(|d| !d.is_empty()) {
        println!("    {}", description);
    }
    println!();
}
