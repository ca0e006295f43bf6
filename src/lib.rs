//! artguard - アート作品スキャン履歴クライアント
//!
//! - history: 履歴・検索・削除・集計APIと分類器のクライアント
//! - controller: ページング・検索・追記読み込みを管理するリストコントローラ
//! - identity: 現在のユーザーの解決

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod identity;
pub mod logging;
