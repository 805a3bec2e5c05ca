//! Size-capped partitions with LRU residency and pluggable persistence.
//!
//! A [`PartitionManager`] shards vectors across partitions, rotating to a
//! fresh partition once the current one reaches its size cap. At most
//! `max_resident` partitions stay in memory; loading one past the cap evicts
//! the least-recently-used resident through the caller's [`PartitionStore`].
//! Without a store, partitions are memory-only and never evicted. A failed
//! load degrades to an empty partition (logged, data loss possible); a
//! failed save aborts the eviction and surfaces the error, keeping the
//! partition resident rather than dropping it.

use crate::config;
use crate::error::IndexError;
use crate::index::combined::{CombinedConfig, CombinedIndexData, SearchOptions, SearchResult};
use crate::storage::{decode_blob, encode_blob, load_blob, save_blob};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Configuration for a partition manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Vectors per partition before rotating to a new one.
    pub partition_size: usize,
    /// Maximum partitions held in memory at once.
    pub max_resident: usize,
    /// Configuration applied to every partition's index.
    pub index: CombinedConfig,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            partition_size: config::PARTITION_DEFAULT_SIZE,
            max_resident: config::PARTITION_DEFAULT_MAX_RESIDENT,
            index: CombinedConfig::default(),
        }
    }
}

/// Partition bookkeeping, persisted alongside the index blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionMeta {
    pub id: u64,
    /// Live vector count.
    pub size: usize,
    /// Unix seconds.
    pub created_at: u64,
    pub modified_at: u64,
}

/// Serialized partition state handed to a [`PartitionStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionBlob {
    pub meta: PartitionMeta,
    /// Snapshot-framed [`CombinedIndexData`].
    pub index_blob: Vec<u8>,
    /// Global ids of the vectors this partition owns.
    pub vector_ids: Vec<u64>,
}

/// Persistence boundary for evicted partitions.
pub trait PartitionStore {
    fn save(&self, partition_id: u64, blob: &PartitionBlob) -> Result<(), IndexError>;
    /// `Ok(None)` means the store has no state for this partition.
    fn load(&self, partition_id: u64) -> Result<Option<PartitionBlob>, IndexError>;
}

/// File-per-partition store under one directory.
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, partition_id: u64) -> PathBuf {
        self.dir.join(format!("partition-{partition_id}.pxi"))
    }
}

impl PartitionStore for DirectoryStore {
    fn save(&self, partition_id: u64, blob: &PartitionBlob) -> Result<(), IndexError> {
        save_blob(blob, &self.path_for(partition_id))
    }

    fn load(&self, partition_id: u64) -> Result<Option<PartitionBlob>, IndexError> {
        let path = self.path_for(partition_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(load_blob(&path)?))
    }
}

struct ResidentPartition<P> {
    meta: PartitionMeta,
    data: CombinedIndexData<P>,
}

/// Shards vectors across size-capped partitions.
pub struct PartitionManager<P> {
    config: PartitionConfig,
    store: Option<Box<dyn PartitionStore>>,
    resident: HashMap<u64, ResidentPartition<P>>,
    /// Resident ids, least recently used first.
    lru: Vec<u64>,
    /// Metadata for every partition ever created, resident or not.
    metas: HashMap<u64, PartitionMeta>,
    /// Global vector id → owning partition.
    routing: HashMap<u64, u64>,
    current: u64,
    next_partition_id: u64,
    next_vector_id: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl<P: Clone + Serialize + DeserializeOwned> PartitionManager<P> {
    pub fn new(config: PartitionConfig, store: Option<Box<dyn PartitionStore>>) -> Self {
        let mut manager = Self {
            config,
            store,
            resident: HashMap::new(),
            lru: Vec::new(),
            metas: HashMap::new(),
            routing: HashMap::new(),
            current: 0,
            next_partition_id: 0,
            next_vector_id: 0,
        };
        manager.current = manager.create_partition();
        manager
    }

    pub fn with_default_config() -> Self {
        Self::new(PartitionConfig::default(), None)
    }

    /// Total live vectors across all partitions.
    pub fn len(&self) -> usize {
        self.routing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routing.is_empty()
    }

    /// Metadata for every known partition, ordered by id.
    pub fn partition_info(&self) -> Vec<PartitionMeta> {
        let mut metas: Vec<PartitionMeta> = self.metas.values().cloned().collect();
        metas.sort_by_key(|m| m.id);
        metas
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    fn create_partition(&mut self) -> u64 {
        let id = self.next_partition_id;
        self.next_partition_id += 1;
        let now = unix_now();
        let meta = PartitionMeta {
            id,
            size: 0,
            created_at: now,
            modified_at: now,
        };
        self.metas.insert(id, meta.clone());
        self.resident.insert(
            id,
            ResidentPartition {
                meta,
                data: CombinedIndexData::new(self.config.index.clone()),
            },
        );
        self.lru.push(id);
        id
    }

    fn touch(&mut self, partition_id: u64) {
        self.lru.retain(|&p| p != partition_id);
        self.lru.push(partition_id);
    }

    /// Make a partition resident, loading it from the store if needed and
    /// evicting over-cap residents first.
    pub fn ensure_loaded(&mut self, partition_id: u64) -> Result<(), IndexError> {
        if !self.metas.contains_key(&partition_id) {
            return Err(IndexError::NotFound(partition_id));
        }
        if self.resident.contains_key(&partition_id) {
            self.touch(partition_id);
            return Ok(());
        }

        let loaded = match self.store.as_ref() {
            Some(store) => match store.load(partition_id) {
                Ok(Some(blob)) => match Self::decode_partition(&blob) {
                    Ok(data) => Some(ResidentPartition {
                        meta: blob.meta,
                        data,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            partition_id,
                            "stored partition failed validation, starting empty: {}",
                            e
                        );
                        None
                    }
                },
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(
                        partition_id,
                        "partition load failed, starting empty (possible data loss): {}",
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let partition = loaded.unwrap_or_else(|| {
            let meta = self.metas.get(&partition_id).cloned().unwrap_or_else(|| {
                let now = unix_now();
                PartitionMeta {
                    id: partition_id,
                    size: 0,
                    created_at: now,
                    modified_at: now,
                }
            });
            ResidentPartition {
                meta,
                data: CombinedIndexData::new(self.config.index.clone()),
            }
        });
        self.metas.insert(partition_id, partition.meta.clone());
        self.resident.insert(partition_id, partition);
        self.lru.push(partition_id);
        self.evict_over_cap(partition_id)?;
        Ok(())
    }

    /// Evict least-recently-used residents until the cap holds. `keep` is
    /// never evicted. Without a store, nothing is evicted.
    fn evict_over_cap(&mut self, keep: u64) -> Result<(), IndexError> {
        if self.store.is_none() {
            return Ok(());
        }
        while self.resident.len() > self.config.max_resident {
            let victim = match self.lru.iter().find(|&&p| p != keep).copied() {
                Some(v) => v,
                None => return Ok(()),
            };
            self.save_partition(victim)?;
            self.resident.remove(&victim);
            self.lru.retain(|&p| p != victim);
            tracing::debug!(partition_id = victim, "evicted partition");
        }
        Ok(())
    }

    /// Serialize one resident partition into the store. The partition stays
    /// resident; callers decide whether to drop it afterwards.
    fn save_partition(&mut self, partition_id: u64) -> Result<(), IndexError> {
        let store = match self.store.as_ref() {
            Some(s) => s,
            None => return Ok(()),
        };
        let partition = self
            .resident
            .get(&partition_id)
            .ok_or(IndexError::NotFound(partition_id))?;
        let blob = PartitionBlob {
            meta: partition.meta.clone(),
            index_blob: encode_blob(&partition.data)?,
            vector_ids: partition.data.payloads.keys().copied().collect(),
        };
        store.save(partition_id, &blob)?;
        Ok(())
    }

    fn decode_partition(blob: &PartitionBlob) -> Result<CombinedIndexData<P>, IndexError> {
        let data: CombinedIndexData<P> = decode_blob(&blob.index_blob)?;
        data.validate().map_err(IndexError::CorruptState)?;
        Ok(data)
    }

    /// Insert into the current partition, rotating to a new one at the size
    /// cap. Returns the vector's global id.
    pub fn add(&mut self, vector: Vec<f32>, payload: P) -> Result<u64, IndexError> {
        self.ensure_loaded(self.current)?;
        let current_len = self
            .resident
            .get(&self.current)
            .map(|p| p.data.len())
            .unwrap_or(0);
        if current_len >= self.config.partition_size {
            let next = self.create_partition();
            tracing::info!(
                from = self.current,
                to = next,
                size = current_len,
                "rotating to new partition"
            );
            self.current = next;
            self.evict_over_cap(next)?;
        }

        let id = self.next_vector_id;
        let pid = self.current;
        let partition = self
            .resident
            .get_mut(&pid)
            .ok_or(IndexError::NotFound(pid))?;
        partition.data.add_with_id(id, vector, payload)?;
        partition.meta.size = partition.data.len();
        partition.meta.modified_at = unix_now();
        self.metas.insert(pid, partition.meta.clone());
        self.routing.insert(id, pid);
        self.next_vector_id += 1;
        Ok(id)
    }

    /// Remove a vector by global id.
    pub fn remove(&mut self, id: u64) -> Result<bool, IndexError> {
        let pid = match self.routing.get(&id).copied() {
            Some(p) => p,
            None => return Ok(false),
        };
        self.ensure_loaded(pid)?;
        let partition = self
            .resident
            .get_mut(&pid)
            .ok_or(IndexError::NotFound(pid))?;
        let removed = partition.data.remove(id);
        partition.meta.size = partition.data.len();
        partition.meta.modified_at = unix_now();
        self.metas.insert(pid, partition.meta.clone());
        self.routing.remove(&id);
        Ok(removed)
    }

    /// Search the selected partitions (all known when `partition_ids` is
    /// `None`), merge, re-sort globally, and return the top `k`.
    pub fn search(
        &mut self,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
        partition_ids: Option<&[u64]>,
    ) -> Result<Vec<SearchResult<P>>, IndexError> {
        let pids: Vec<u64> = match partition_ids {
            Some(ids) => ids
                .iter()
                .copied()
                .filter(|p| self.metas.contains_key(p))
                .collect(),
            None => {
                let mut all: Vec<u64> = self.metas.keys().copied().collect();
                all.sort_unstable();
                all
            }
        };

        let mut merged: Vec<SearchResult<P>> = Vec::new();
        for pid in pids {
            self.ensure_loaded(pid)?;
            if let Some(partition) = self.resident.get(&pid) {
                merged.extend(partition.data.search(query, k, options)?);
            }
        }
        merged.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        merged.truncate(k);
        Ok(merged)
    }

    /// Persist every resident partition. Residency is unchanged.
    pub fn save_all(&mut self) -> Result<(), IndexError> {
        if self.store.is_none() {
            return Ok(());
        }
        let pids: Vec<u64> = self.resident.keys().copied().collect();
        for pid in pids {
            self.save_partition(pid)?;
        }
        Ok(())
    }
}
