//! ダイジェストキャッシュ
//!
//! ビルドキャッシュID → レジストリダイジェストの対応を `.digestcache`（JSON）に保存し、
//! 同じ内容のイメージを再プッシュしないようにします。
//!
//! 読み込みの失敗は空のキャッシュとして扱い、書き込みの失敗はエラーにします。
//! 同じビルドキャッシュIDへの同時プッシュは1回にまとめられます。

use crate::error::{BuildError, Result};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// ダイジェストの取得元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// キャッシュにあった（プッシュしていない）
    Hit,
    /// プッシュして取得した
    Pushed,
}

type Slot = Arc<OnceCell<String>>;

#[derive(Debug)]
pub struct DigestCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, Slot>>,
}

impl DigestCache {
    /// キャッシュファイルを読み込む
    ///
    /// ファイルがない・壊れている場合は空のキャッシュを返す。
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(entries) => {
                    debug!(path = %path.display(), entries = entries.len(), "Loaded digest cache");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not deserialize digest cache");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No digest cache found, starting empty");
                HashMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read digest cache");
                HashMap::new()
            }
        };

        Self::from_entries(path, entries)
    }

    pub fn from_entries(path: impl Into<PathBuf>, entries: HashMap<String, String>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(cache_id, digest)| (cache_id, Arc::new(OnceCell::new_with(Some(digest)))))
            .collect();
        Self {
            path: path.into(),
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, cache_id: &str) -> Option<String> {
        self.lock()
            .get(cache_id)
            .and_then(|slot| slot.get().cloned())
    }

    /// キャッシュ済みならそのダイジェストを、なければ `push` を実行して記録する
    ///
    /// 同じ `cache_id` で同時に呼ばれた場合、`push` を実行するのは1つだけで、
    /// 残りはその結果を待って再利用する。`push` が失敗したエントリは空のまま残る。
    pub async fn resolve<F, Fut>(&self, cache_id: &str, push: F) -> Result<(String, CacheOutcome)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let slot = self.lock().entry(cache_id.to_string()).or_default().clone();

        if let Some(digest) = slot.get() {
            return Ok((digest.clone(), CacheOutcome::Hit));
        }

        let mut pushed = false;
        let digest = slot
            .get_or_try_init(|| {
                pushed = true;
                push()
            })
            .await?
            .clone();

        let outcome = if pushed {
            CacheOutcome::Pushed
        } else {
            CacheOutcome::Hit
        };
        Ok((digest, outcome))
    }

    /// 確定済みのエントリ
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock()
            .iter()
            .filter_map(|(cache_id, slot)| slot.get().map(|d| (cache_id.clone(), d.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// キャッシュファイルに書き出す
    pub async fn persist(&self) -> Result<()> {
        let content = serde_json::to_string(&self.snapshot()).map_err(|e| {
            BuildError::CachePersist {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })?;

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| BuildError::CachePersist {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        debug!(path = %self.path.display(), "Persisted digest cache");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
