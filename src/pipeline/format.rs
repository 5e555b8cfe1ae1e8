use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::{
    clients::discord::MESSAGE_CHAR_LIMIT, scheduler::CycleContext, util::text::truncate_chars,
};

use super::summarize::{SummarizedArticle, SummarizedBatch};

/// メッセージに載せる要約の上限文字数。
const SUMMARY_MAX_CHARS: usize = 1500;

/// 投稿可能な整形済みメッセージ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedMessage {
    /// ログ用の記事タイトル
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedBatch {
    pub cycle_id: Uuid,
    pub messages: Vec<FormattedMessage>,
}

#[async_trait]
pub trait FormatStage: Send + Sync {
    async fn format(&self, cycle: &CycleContext, batch: SummarizedBatch) -> Result<FormattedBatch>;
}

/// Discordのマークダウンに合わせた整形ステージ。
#[derive(Debug, Default, Clone)]
pub struct DiscordFormatStage;

impl DiscordFormatStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FormatStage for DiscordFormatStage {
    async fn format(&self, cycle: &CycleContext, batch: SummarizedBatch) -> Result<FormattedBatch> {
        let messages = batch
            .articles
            .iter()
            .map(|article| FormattedMessage {
                title: article.article.title.clone(),
                body: format_message(article),
            })
            .collect::<Vec<_>>();

        debug!(
            cycle_id = %cycle.cycle_id,
            messages = messages.len(),
            "formatted messages for publishing"
        );

        Ok(FormattedBatch {
            cycle_id: batch.cycle_id,
            messages,
        })
    }
}

/// タイトル、日付、要約、リンクを1通のメッセージに組み立てる。
///
/// 末尾のリンクはチャットクライアント側のプレビュー展開を誘発する。
/// 全体がDiscordの文字数上限に収まるよう要約部分を切り詰める。
fn format_message(article: &SummarizedArticle) -> String {
    let mut message = format!(
        "**🚨 {} • BREAKING NEWS**\n**{}**\n\n",
        article.article.source.to_uppercase(),
        article.article.title
    );

    if let Some(published_at) = article.article.published_at {
        message.push_str(&format!(
            "*Published: {}*\n\n",
            published_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }

    let footer = format!("Read more: {}", article.article.url);

    if !article.summary.is_empty() {
        let joined = article.summary.join(" ");
        let budget = MESSAGE_CHAR_LIMIT
            .saturating_sub(message.chars().count() + footer.chars().count() + 2)
            .min(SUMMARY_MAX_CHARS);
        let capped = truncate_chars(&joined, budget);
        if !capped.is_empty() {
            message.push_str(capped);
            message.push_str("\n\n");
        }
    }

    message.push_str(&footer);
    message
}
