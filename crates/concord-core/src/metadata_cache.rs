//! 元数据缓存
//!
//! 按组件定义懒计算构造器参数与生命周期方法签名，结果缓存复用。
//! 条目按定义名称缓存：同一声明类型可以有多个构造声明不同的
//! 定义，各自的参数列表互不干扰。容量满时按访问次数淘汰最冷的
//! 四分之一；除替换/注销对应定义外只有显式 `clear` 会失效。

use concord_common::{
    ComponentDefinition, ConstructorMetadata, HookKind, MethodMetadata, ParameterMetadata,
    TypeMetadata,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 默认缓存容量
pub const DEFAULT_METADATA_CAPACITY: usize = 1000;

struct CacheEntry {
    metadata: Arc<TypeMetadata>,
    access_count: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// 元数据缓存统计
#[derive(Debug, Clone)]
pub struct MetadataCacheStatistics {
    /// 当前条目数
    pub entries: usize,
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 累计淘汰条目数
    pub evictions: u64,
    /// 命中率
    pub hit_rate: f64,
}

/// 组件元数据缓存
pub struct MetadataCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl MetadataCache {
    /// 以指定容量创建缓存
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// 取（或懒计算）定义的元数据
    pub fn metadata_for(&self, definition: &ComponentDefinition) -> Arc<TypeMetadata> {
        let mut state = self.state.lock();

        if let Some(entry) = state.entries.get_mut(&definition.name) {
            entry.access_count += 1;
            let metadata = entry.metadata.clone();
            state.hits += 1;
            return metadata;
        }

        state.misses += 1;
        if state.entries.len() >= self.capacity {
            Self::evict_coldest(&mut state);
        }

        let metadata = Arc::new(derive_metadata(definition));
        debug!(component = %definition.name, type_name = %definition.type_info.name, "计算组件元数据");
        state.entries.insert(
            definition.name.clone(),
            CacheEntry {
                metadata: metadata.clone(),
                access_count: 1,
            },
        );
        metadata
    }

    /// 使指定定义的条目失效（定义被替换或注销时调用）
    pub fn invalidate(&self, name: &str) {
        self.state.lock().entries.remove(name);
    }

    /// 淘汰访问次数最少的四分之一条目（至少一条）
    fn evict_coldest(state: &mut CacheState) {
        let mut counts: Vec<(String, u64)> = state
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.access_count))
            .collect();
        counts.sort_by_key(|(_, count)| *count);
        let victims = (counts.len() / 4).max(1);
        for (name, _) in counts.into_iter().take(victims) {
            state.entries.remove(&name);
            state.evictions += 1;
        }
    }

    /// 清空缓存并重置统计
    pub fn clear(&self) {
        let mut state = self.state.lock();
        *state = CacheState::default();
    }

    /// 当前统计信息
    pub fn statistics(&self) -> MetadataCacheStatistics {
        let state = self.state.lock();
        let total = state.hits + state.misses;
        MetadataCacheStatistics {
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            hit_rate: if total == 0 {
                0.0
            } else {
                state.hits as f64 / total as f64
            },
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_CAPACITY)
    }
}

/// 从组件定义派生类型元数据
fn derive_metadata(definition: &ComponentDefinition) -> TypeMetadata {
    let parameters = definition
        .constructor_args
        .iter()
        .map(|spec| ParameterMetadata {
            name: spec.name.clone(),
            target: spec.target.clone(),
            required: spec.required,
            value_typed: spec.is_value_type(),
            has_default: spec.default.is_some(),
        })
        .collect();

    let mut methods = Vec::new();
    if let Some(hook) = &definition.init_hook {
        methods.push(MethodMetadata {
            name: hook.name.clone(),
            kind: HookKind::Init,
        });
    }
    if let Some(hook) = &definition.destroy_hook {
        methods.push(MethodMetadata {
            name: hook.name.clone(),
            kind: HookKind::Destroy,
        });
    }
    if let Some(hook) = &definition.reset_hook {
        methods.push(MethodMetadata {
            name: hook.name.clone(),
            kind: HookKind::Reset,
        });
    }

    TypeMetadata {
        type_info: definition.type_info.clone(),
        constructor: ConstructorMetadata { parameters },
        methods,
    }
}
