//! ファイル内容キャッシュ
//!
//! 1回の実行の間、同じパスの読み込み結果を再利用します。
//! 実行中にソースファイルは変更されない前提のため、キャッシュは無効化しません。

use crate::error::{CoreError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct FileCache {
    entries: Mutex<HashMap<PathBuf, Arc<str>>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// ファイルを UTF-8 テキストとして読み込む（2回目以降はキャッシュから返す）
    pub async fn read(&self, path: &Path) -> Result<Arc<str>> {
        let cached = self.lock().get(path).cloned();
        if let Some(content) = cached {
            return Ok(content);
        }

        let content: Arc<str> = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::io(path, e))?
            .into();

        // 同時に読み込まれた場合は先に入った方を採用する
        let cached = self
            .lock()
            .entry(path.to_path_buf())
            .or_insert(content)
            .clone();
        Ok(cached)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<str>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
