/// テキスト正規化と類似度判定のユーティリティ。
///
/// タイトル・URLの正規化、HTML除去、文分割、類似度計算を提供します。
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// タイトル比較から除外する頻出語。
///
/// 冠詞や前置詞の揺れで類似度が水増しされるのを防ぎます。
const TITLE_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "in", "on", "at", "to", "for", "with", "and", "but", "or",
];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// タイトルを比較用に正規化する。
///
/// 小文字化、約物の除去、空白の圧縮、ストップワードの除去を行います。
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_ascii_punctuation() { ' ' } else { c })
        .collect();
    stripped
        .split_whitespace()
        .filter(|word| !TITLE_STOP_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// URLを重複判定用に正規化する。
///
/// トラッキング系クエリパラメータ、フラグメント、末尾スラッシュを除去します。
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = reqwest::Url::parse(trimmed) else {
        // スキームなしなどパース不能な場合は文字列処理にフォールバック
        let without_fragment = trimmed.split('#').next().unwrap_or_default();
        return without_fragment.trim_end_matches('/').to_string();
    };

    url.set_fragment(None);
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if retained.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &retained {
            pairs.append_pair(key, value);
        }
    }

    url.to_string().trim_end_matches('/').to_string()
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || matches!(key.as_str(), "source" | "fbclid" | "ref" | "igshid")
}

/// HTML断片からタグを取り除き、表示用のプレーンテキストを返す。
#[must_use]
pub fn strip_html(html: &str) -> String {
    let cleaned = ammonia::Builder::empty().clean(html).to_string();
    let decoded = decode_entities(&cleaned);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

// ammoniaはテキストノードを再エスケープするため、表示前に主要な実体参照を戻す。
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// 2つの正規化済み文字列の類似度を[0,1]で返す。
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// テキストを文に分割する。
///
/// Unicode UAX#29に準拠した文境界検出を使用します。
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    text.unicode_sentences()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 文字数上限でテキストを切り詰める（文字境界を保持）。
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
