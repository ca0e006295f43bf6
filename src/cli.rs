use artguard_common::StatusFilter;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "artguard")]
#[command(about = "アート作品スキャン履歴クライアント", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// APIのベースURL（設定ファイルより優先）
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// スキャン履歴を新しい順に表示
    History {
        /// 読み込むページ数
        #[arg(short, long, default_value = "1")]
        pages: usize,

        /// ステータスで絞り込み (all/uploaded/processing/completed/failed)
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,

        /// 直近N日に作成されたスキャンだけ表示
        #[arg(long)]
        since_days: Option<u32>,
    },

    /// スキャン履歴をキーワード検索
    Search {
        /// 検索キーワード（説明・ファイル名・ラベル）
        #[arg(required = true)]
        query: String,

        /// 読み込むページ数
        #[arg(short, long, default_value = "1")]
        pages: usize,
    },

    /// スキャンを1件削除
    Delete {
        #[arg(required = true)]
        id: String,
    },

    /// スキャンをまとめて削除
    BatchDelete {
        #[arg(required = true)]
        ids: Vec<String>,

        /// 確認せずに削除
        #[arg(short, long)]
        yes: bool,
    },

    /// スキャンの説明・ステータスを更新
    Update {
        #[arg(required = true)]
        id: String,

        /// 説明
        #[arg(short, long)]
        description: Option<String>,

        /// ステータス
        #[arg(short, long)]
        status: Option<String>,
    },

    /// 集計を表示
    Analytics {
        /// 集計期間（日数、省略時は設定値）
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// 画像を分類器で再解析
    Reanalyze {
        #[arg(required = true)]
        id: String,

        /// 判定結果をサーバーに保存
        #[arg(long)]
        save: bool,
    },

    /// 全履歴をJSONに書き出し
    Export {
        /// 出力JSONファイル
        #[arg(required = true)]
        output: PathBuf,

        /// 1リクエストあたりの件数
        #[arg(short, long, default_value = "100")]
        batch_size: usize,
    },

    /// APIサーバーの稼働確認
    Health,

    /// 設定を表示/編集
    Config {
        /// ユーザーIDを設定
        #[arg(long)]
        set_user_id: Option<String>,

        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// APIのベースURLを設定
        #[arg(long)]
        set_api_url: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
