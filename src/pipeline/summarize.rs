/// 抽出型要約ステージ。
///
/// 文ごとに語の出現頻度スコアを合計し、上位の文を元の順序で返します。
use std::num::NonZeroUsize;

use anyhow::Result;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::debug;
use uuid::Uuid;

use crate::{scheduler::CycleContext, util::text::split_sentences};

use super::{fetch::Article, filter::NovelBatch};

/// 頻度集計から除外するストップワード。
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "can", "it", "its", "this",
    "that", "these", "those", "he", "she", "we", "they", "you", "i", "not", "no", "so", "than",
    "too", "very", "just", "also", "about", "into", "over", "after", "before", "between", "his",
    "her", "their", "our", "your", "who", "what", "which", "when", "where", "how",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizedArticle {
    pub article: Article,
    pub summary: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizedBatch {
    pub cycle_id: Uuid,
    pub articles: Vec<SummarizedArticle>,
}

#[async_trait]
pub trait SummarizeStage: Send + Sync {
    async fn summarize(&self, cycle: &CycleContext, batch: NovelBatch) -> Result<SummarizedBatch>;
}

/// 語頻度ベースの抽出型要約ステージ。
#[derive(Debug, Clone)]
pub struct TfSummarizeStage {
    num_sentences: NonZeroUsize,
}

impl TfSummarizeStage {
    pub fn new(num_sentences: NonZeroUsize) -> Self {
        Self { num_sentences }
    }
}

#[async_trait]
impl SummarizeStage for TfSummarizeStage {
    async fn summarize(&self, cycle: &CycleContext, batch: NovelBatch) -> Result<SummarizedBatch> {
        let articles = batch
            .articles
            .into_iter()
            .map(|article| {
                let summary = summarize(&article.summary_source, self.num_sentences.get());
                SummarizedArticle { article, summary }
            })
            .collect::<Vec<_>>();

        debug!(
            cycle_id = %cycle.cycle_id,
            articles = articles.len(),
            "summarized novel articles"
        );

        Ok(SummarizedBatch {
            cycle_id: batch.cycle_id,
            articles,
        })
    }
}

/// テキストを要約し、選ばれた文を元の文書順で返す。
///
/// 文数が`num_sentences`以下の場合は全文をそのまま返す。
#[must_use]
pub fn summarize(text: &str, num_sentences: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.len() <= num_sentences {
        return sentences;
    }

    let tokenized: Vec<Vec<String>> = sentences.iter().map(|s| tokenize(s)).collect();

    let mut frequencies: FxHashMap<&str, usize> = FxHashMap::default();
    for tokens in &tokenized {
        for token in tokens {
            *frequencies.entry(token.as_str()).or_insert(0) += 1;
        }
    }

    let mut scored: Vec<(usize, usize)> = tokenized
        .iter()
        .enumerate()
        .map(|(index, tokens)| {
            let score = tokens
                .iter()
                .map(|token| frequencies[token.as_str()])
                .sum::<usize>();
            (index, score)
        })
        .collect();

    // スコア降順、同点なら文書内で先に出た文を優先
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut picked: Vec<usize> = scored
        .into_iter()
        .take(num_sentences)
        .map(|(index, _)| index)
        .collect();
    picked.sort_unstable();

    picked
        .into_iter()
        .map(|index| sentences[index].clone())
        .collect()
}

fn tokenize(sentence: &str) -> Vec<String> {
    sentence
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(word))
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "The economy grew strongly this quarter. Officials credited the \
        export sector for the growth. Growth in exports was driven by strong demand. \
        A local bakery also opened downtown. The weather was pleasant all week. \
        Analysts expect export growth to continue next quarter.";

    #[test]
    fn summarize_returns_requested_sentence_count() {
        let summary = summarize(TEXT, 3);
        assert_eq!(summary.len(), 3);
    }

    #[test]
    fn summarize_preserves_document_order() {
        let sentences = split_sentences(TEXT);
        let summary = summarize(TEXT, 3);

        let positions: Vec<usize> = summary
            .iter()
            .map(|s| sentences.iter().position(|orig| orig == s).expect("present"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn summarize_prefers_high_frequency_sentences() {
        let summary = summarize(TEXT, 2);

        // "growth"と"export"が頻出するため、それらを含む文が選ばれる
        assert!(summary.iter().any(|s| s.contains("export")));
        assert!(!summary.iter().any(|s| s.contains("bakery")));
    }

    #[test]
    fn summarize_returns_all_when_document_is_short() {
        let text = "One sentence here. Another one there.";
        let summary = summarize(text, 5);
        assert_eq!(summary.len(), 2);
    }

    #[test]
    fn summarize_handles_empty_text() {
        assert!(summarize("", 5).is_empty());
    }

    #[test]
    fn summarize_exactly_five_from_longer_document() {
        let text = (0..8)
            .map(|i| format!("Sentence number {i} talks about topic {i}."))
            .collect::<Vec<_>>()
            .join(" ");
        let summary = summarize(&text, 5);
        assert_eq!(summary.len(), 5);
    }

    #[tokio::test]
    async fn stage_summarizes_each_article() {
        let stage = TfSummarizeStage::new(NonZeroUsize::new(2).expect("non-zero"));
        let cycle = CycleContext::new();
        let batch = NovelBatch {
            cycle_id: cycle.cycle_id,
            articles: vec![Article {
                source: "wire".into(),
                title: "Economy".into(),
                url: "https://example.com/economy".into(),
                published_at: None,
                summary_source: TEXT.into(),
            }],
            duplicates: 0,
        };

        let summarized = stage
            .summarize(&cycle, batch)
            .await
            .expect("summarize succeeds");

        assert_eq!(summarized.articles.len(), 1);
        assert_eq!(summarized.articles[0].summary.len(), 2);
    }
}
