/// 既出記事ストア。
///
/// 正規化済みURL・タイトルを保持期間つきで記録し、重複判定に使う。
/// スナップショットファイルを介して再起動をまたいで状態を引き継ぎます。
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::util::text::similarity;

/// タイトル長の差がこの文字数を超えるペアは比較しない。
const LENGTH_PREFILTER_CHARS: usize = 15;

/// 既出記事1件の記録。URL・タイトルは正規化済み。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenRecord {
    pub url: String,
    pub title: String,
    pub seen_at: DateTime<Utc>,
}

/// 保持期間つきの既出記事リスト。
#[derive(Debug)]
pub struct SeenStore {
    records: Vec<SeenRecord>,
    retention: Duration,
    similarity_threshold: f64,
    snapshot_path: PathBuf,
}

impl SeenStore {
    /// スナップショットファイルからストアを復元する。
    ///
    /// ファイルが無い場合は空で開始する。破損している場合は警告を出して
    /// 空で開始する（重複の再送は許容し、クラッシュはしない）。
    #[must_use]
    pub fn load(
        snapshot_path: &Path,
        retention: Duration,
        similarity_threshold: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let records = match std::fs::read_to_string(snapshot_path) {
            Ok(contents) => match serde_json::from_str::<Vec<SeenRecord>>(&contents) {
                Ok(records) => records,
                Err(error) => {
                    warn!(
                        path = %snapshot_path.display(),
                        %error,
                        "seen snapshot is corrupt, starting empty"
                    );
                    Vec::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => {
                warn!(
                    path = %snapshot_path.display(),
                    %error,
                    "failed to read seen snapshot, starting empty"
                );
                Vec::new()
            }
        };

        let mut store = Self {
            records,
            retention,
            similarity_threshold,
            snapshot_path: snapshot_path.to_path_buf(),
        };
        let evicted = store.evict_expired(now);
        debug!(
            loaded = store.records.len(),
            evicted, "seen store restored from snapshot"
        );
        store
    }

    /// 記事が既出かどうかを判定する。
    ///
    /// 判定前に保持期間を過ぎた記録を遅延削除する。正規化URLの完全一致、
    /// または保持中のいずれかのタイトルとの類似度が閾値以上なら重複。
    pub fn is_duplicate(
        &mut self,
        normalized_url: &str,
        normalized_title: &str,
        now: DateTime<Utc>,
    ) -> bool {
        self.evict_expired(now);

        if self.records.iter().any(|record| record.url == normalized_url) {
            return true;
        }

        let incoming_len = normalized_title.chars().count();
        self.records.iter().any(|record| {
            let retained_len = record.title.chars().count();
            if incoming_len.abs_diff(retained_len) > LENGTH_PREFILTER_CHARS {
                return false;
            }
            similarity(normalized_title, &record.title) >= self.similarity_threshold
        })
    }

    /// 受理した記事を記録する。
    pub fn record(&mut self, normalized_url: String, normalized_title: String, now: DateTime<Utc>) {
        self.records.push(SeenRecord {
            url: normalized_url,
            title: normalized_title,
            seen_at: now,
        });
    }

    /// スナップショットをファイルへ書き出す。
    ///
    /// # Errors
    /// シリアライズまたはファイル書き込みに失敗した場合はエラーを返す。
    pub fn save(&self) -> Result<()> {
        let serialized =
            serde_json::to_string(&self.records).context("failed to serialize seen records")?;
        std::fs::write(&self.snapshot_path, serialized).with_context(|| {
            format!(
                "failed to write seen snapshot to {}",
                self.snapshot_path.display()
            )
        })?;
        Ok(())
    }

    /// 保持期間を過ぎた記録を取り除き、削除件数を返す。
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let before = self.records.len();
        self.records.retain(|record| record.seen_at >= cutoff);
        before - self.records.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn oldest_seen_at(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|record| record.seen_at).min()
    }
}
