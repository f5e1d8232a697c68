//! 作用域管理器实现
//!
//! 单例与请求作用域使用分段哈希表缓存实例；原型作用域不缓存，
//! 只维护诊断计数。

use concord_abstractions::{ScopeManager, ScopeStatistics};
use concord_common::{ContainerError, ContainerResult, Instance, ScopeKind};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 单例作用域管理器
///
/// 名称按分段哈希表存储以降低争用，分段数只影响吞吐不影响正确性。
pub struct SingletonScopeManager {
    instances: DashMap<String, Instance>,
    created: AtomicU64,
}

impl SingletonScopeManager {
    /// 以指定分段数创建（分段数必须是 2 的幂）
    pub fn new(segments: usize) -> Self {
        Self {
            instances: DashMap::with_shard_amount(segments),
            created: AtomicU64::new(0),
        }
    }
}

impl ScopeManager for SingletonScopeManager {
    fn kind(&self) -> ScopeKind {
        ScopeKind::Singleton
    }

    fn lookup(&self, name: &str) -> Option<Instance> {
        self.instances.get(name).map(|entry| entry.clone())
    }

    fn publish(&self, name: &str, instance: Instance) {
        self.created.fetch_add(1, Ordering::Relaxed);
        self.instances.insert(name.to_string(), instance);
    }

    fn remove(&self, name: &str) -> Option<Instance> {
        self.instances.remove(name).map(|(_, instance)| instance)
    }

    fn clear(&self) -> usize {
        let count = self.instances.len();
        self.instances.clear();
        count
    }

    fn drain(&self) -> Vec<(String, Instance)> {
        let names: Vec<String> = self.instances.iter().map(|e| e.key().clone()).collect();
        names
            .into_iter()
            .filter_map(|name| self.instances.remove(&name))
            .collect()
    }

    fn statistics(&self) -> ScopeStatistics {
        ScopeStatistics {
            kind: ScopeKind::Singleton,
            instance_count: self.instances.len(),
            created_total: self.created.load(Ordering::Relaxed),
        }
    }
}

/// 请求作用域管理器
///
/// 与单例相同的缓存行为，但在外部信号的请求边界上整体清空。
pub struct RequestScopeManager {
    instances: DashMap<String, Instance>,
    created: AtomicU64,
    boundary: RwLock<Uuid>,
}

impl RequestScopeManager {
    /// 以指定分段数创建
    pub fn new(segments: usize) -> Self {
        Self {
            instances: DashMap::with_shard_amount(segments),
            created: AtomicU64::new(0),
            boundary: RwLock::new(Uuid::new_v4()),
        }
    }

    /// 当前请求边界标识
    pub fn boundary(&self) -> Uuid {
        *self.boundary.read()
    }
}

impl ScopeManager for RequestScopeManager {
    fn kind(&self) -> ScopeKind {
        ScopeKind::Request
    }

    fn lookup(&self, name: &str) -> Option<Instance> {
        self.instances.get(name).map(|entry| entry.clone())
    }

    fn publish(&self, name: &str, instance: Instance) {
        self.created.fetch_add(1, Ordering::Relaxed);
        self.instances.insert(name.to_string(), instance);
    }

    fn remove(&self, name: &str) -> Option<Instance> {
        self.instances.remove(name).map(|(_, instance)| instance)
    }

    /// 清空即结束一次请求边界，同时轮换边界标识
    fn clear(&self) -> usize {
        let count = self.instances.len();
        self.instances.clear();
        let mut boundary = self.boundary.write();
        debug!(previous = %*boundary, flushed = count, "请求边界结束");
        *boundary = Uuid::new_v4();
        count
    }

    fn drain(&self) -> Vec<(String, Instance)> {
        let names: Vec<String> = self.instances.iter().map(|e| e.key().clone()).collect();
        names
            .into_iter()
            .filter_map(|name| self.instances.remove(&name))
            .collect()
    }

    fn statistics(&self) -> ScopeStatistics {
        ScopeStatistics {
            kind: ScopeKind::Request,
            instance_count: self.instances.len(),
            created_total: self.created.load(Ordering::Relaxed),
        }
    }
}

/// 原型作用域管理器
///
/// 不做跨调用缓存，每次获取都产生（或从对象池复用）新实例；
/// 仅维护创建计数用于诊断。
#[derive(Default)]
pub struct PrototypeScopeManager {
    created: AtomicU64,
}

impl PrototypeScopeManager {
    /// 创建原型作用域管理器
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScopeManager for PrototypeScopeManager {
    fn kind(&self) -> ScopeKind {
        ScopeKind::Prototype
    }

    fn caches_instances(&self) -> bool {
        false
    }

    fn lookup(&self, _name: &str) -> Option<Instance> {
        None
    }

    fn publish(&self, _name: &str, _instance: Instance) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    fn remove(&self, _name: &str) -> Option<Instance> {
        None
    }

    fn clear(&self) -> usize {
        0
    }

    fn drain(&self) -> Vec<(String, Instance)> {
        Vec::new()
    }

    fn statistics(&self) -> ScopeStatistics {
        ScopeStatistics {
            kind: ScopeKind::Prototype,
            instance_count: 0,
            created_total: self.created.load(Ordering::Relaxed),
        }
    }
}

/// 作用域管理器注册表
///
/// 请求未注册的作用域是致命的配置错误，调用方不应重试。
pub struct ScopeRegistry {
    managers: RwLock<HashMap<ScopeKind, Arc<dyn ScopeManager>>>,
}

impl ScopeRegistry {
    /// 创建注册了全部内置作用域的注册表
    pub fn new(segments: usize) -> Self {
        let registry = Self::empty();
        registry.register_manager(Arc::new(SingletonScopeManager::new(segments)));
        registry.register_manager(Arc::new(PrototypeScopeManager::new()));
        registry.register_manager(Arc::new(RequestScopeManager::new(segments)));
        registry
    }

    /// 创建空注册表
    pub fn empty() -> Self {
        Self {
            managers: RwLock::new(HashMap::new()),
        }
    }

    /// 注册（或替换）某一作用域的管理器
    pub fn register_manager(&self, manager: Arc<dyn ScopeManager>) {
        self.managers.write().insert(manager.kind(), manager);
    }

    /// 取指定作用域的管理器
    pub fn manager(&self, kind: ScopeKind) -> ContainerResult<Arc<dyn ScopeManager>> {
        self.managers
            .read()
            .get(&kind)
            .cloned()
            .ok_or_else(|| ContainerError::UnsupportedScope {
                scope: kind.to_string(),
            })
    }

    /// 全部已注册的管理器
    pub fn all(&self) -> Vec<Arc<dyn ScopeManager>> {
        self.managers.read().values().cloned().collect()
    }
}
