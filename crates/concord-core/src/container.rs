//! 容器门面
//!
//! 组合定义注册表、作用域管理器、创建锁表、对象池与元数据缓存，
//! 对外暴露注册、获取与关闭接口。容器实例由使用方构造并显式
//! 持有，没有任何全局默认实例。

use crate::coordinator::{CreationLockTable, InFlightGuard};
use crate::metadata_cache::{MetadataCache, MetadataCacheStatistics, DEFAULT_METADATA_CAPACITY};
use crate::pool::{PoolConfig, PoolStatistics, PrototypePoolManager};
use crate::registry::DefinitionRegistry;
use crate::scope::ScopeRegistry;
use chrono::{DateTime, Utc};
use concord_abstractions::{ComponentPostProcessor, ScopeManager, ScopeStatistics};
use concord_common::{
    ComponentDefinition, ContainerError, ContainerResult, HookSpec, Instance, LifecycleCallback,
    ScopeKind, TypeInfo,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 容器配置
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// 等待其他线程完成创建的上限
    pub creation_wait: Duration,
    /// 缓存作用域存储的分段数（2 的幂）
    pub segments: usize,
    /// 元数据缓存容量
    pub metadata_cache_capacity: usize,
    /// 原型对象池配置
    pub pool: PoolConfig,
    /// 提前实例化时的并行工作线程数
    pub eager_init_workers: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            creation_wait: Duration::from_secs(5),
            segments: 16,
            metadata_cache_capacity: DEFAULT_METADATA_CAPACITY,
            pool: PoolConfig::default(),
            eager_init_workers: 4,
        }
    }
}

/// 容器运行时统计快照
#[derive(Debug, Clone)]
pub struct ContainerStatistics {
    /// 快照生成时间
    pub generated_at: DateTime<Utc>,
    /// 已注册定义数量
    pub definitions: usize,
    /// 各作用域统计
    pub scopes: Vec<ScopeStatistics>,
    /// 各原型池统计（按类型名称）
    pub pools: HashMap<String, PoolStatistics>,
    /// 元数据缓存统计
    pub metadata_cache: MetadataCacheStatistics,
}

/// 组件容器
///
/// 全部公开操作线程安全。使用方通常以 `Arc<Container>` 共享一个
/// 实例给多个工作线程。
pub struct Container {
    pub(crate) config: ContainerConfig,
    pub(crate) registry: DefinitionRegistry,
    pub(crate) scopes: ScopeRegistry,
    pub(crate) locks: CreationLockTable,
    pub(crate) metadata: MetadataCache,
    pub(crate) pools: PrototypePoolManager,
    pub(crate) callbacks: RwLock<Vec<Arc<dyn LifecycleCallback>>>,
    pub(crate) processors: RwLock<Vec<Arc<dyn ComponentPostProcessor>>>,
    closed: AtomicBool,
}

impl Container {
    /// 以默认配置创建容器
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// 以指定配置创建容器
    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            registry: DefinitionRegistry::new(),
            scopes: ScopeRegistry::new(config.segments),
            locks: CreationLockTable::new(),
            metadata: MetadataCache::new(config.metadata_cache_capacity),
            pools: PrototypePoolManager::new(config.pool.clone()),
            callbacks: RwLock::new(Vec::new()),
            processors: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
            config,
        }
    }

    /// 创建容器构建器
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    fn ensure_active(&self) -> ContainerResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ContainerError::ContainerUnavailable);
        }
        Ok(())
    }

    /// 注册组件定义，名称重复时拒绝
    pub fn register(&self, definition: ComponentDefinition) -> ContainerResult<()> {
        self.ensure_active()?;
        self.registry.register(definition)
    }

    /// 注册组件定义，名称重复时替换并清除旧缓存实例
    pub fn register_or_replace(
        &self,
        definition: ComponentDefinition,
    ) -> ContainerResult<Option<Arc<ComponentDefinition>>> {
        self.ensure_active()?;
        let previous = self.registry.register_or_replace(definition);
        if let Some(old) = &previous {
            self.evict_instance(old);
        }
        Ok(previous)
    }

    /// 注销组件定义并清除其缓存实例，返回是否存在
    pub fn deregister(&self, name: &str) -> bool {
        match self.registry.deregister(name) {
            Some(definition) => {
                self.evict_instance(&definition);
                true
            }
            None => false,
        }
    }

    /// 清除定义名下的全部残留：缓存实例、池中空闲实例和元数据条目
    ///
    /// 缓存实例会尽力执行其销毁方法。
    fn evict_instance(&self, definition: &ComponentDefinition) {
        self.metadata.invalidate(&definition.name);
        if definition.scope == ScopeKind::Prototype {
            let flushed = self.pools.clear_type(&definition.type_info);
            if flushed > 0 {
                debug!(component = %definition.name, flushed, "清空旧定义的池中空闲实例");
            }
        }
        let Ok(manager) = self.scopes.manager(definition.scope) else {
            return;
        };
        if let Some(instance) = manager.remove(&definition.name) {
            self.destroy_instance(&definition.name, &instance, definition.destroy_hook.as_ref());
        }
    }

    /// 按名称获取组件实例
    pub fn get(&self, name: &str) -> ContainerResult<Instance> {
        self.ensure_active()?;
        let definition = self.registry.lookup(name)?;
        self.obtain(&definition)
    }

    /// 按名称获取并向下转型
    pub fn get_typed<T: Send + Sync + 'static>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.get(name)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    /// 按类型获取组件实例
    ///
    /// 多候选时要求限定符或唯一 `primary`。
    pub fn get_by_type<T: Send + Sync + 'static>(
        &self,
        qualifier: Option<&str>,
    ) -> ContainerResult<Arc<T>> {
        self.ensure_active()?;
        let definition = self
            .registry
            .select_by_type(&TypeInfo::of::<T>(), qualifier)?;
        self.obtain(&definition)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    /// 按类型信息获取组件实例（不做转型）
    pub fn get_by_type_info(&self, target: &TypeInfo) -> ContainerResult<Instance> {
        self.ensure_active()?;
        let definition = self.registry.select_by_type(target, None)?;
        self.obtain(&definition)
    }

    /// 是否注册了指定名称
    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// 全部已注册名称
    pub fn names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// 查看指定名称的定义
    pub fn definition(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        self.registry.get(name)
    }

    /// 注册容器级生命周期回调
    pub fn add_lifecycle_callback(&self, callback: Arc<dyn LifecycleCallback>) {
        let mut callbacks = self.callbacks.write();
        callbacks.push(callback);
        callbacks.sort_by_key(|c| c.order());
    }

    /// 注册组件后置处理器
    pub fn add_post_processor(&self, processor: Arc<dyn ComponentPostProcessor>) {
        let mut processors = self.processors.write();
        processors.push(processor);
        processors.sort_by_key(|p| p.order());
    }

    /// 并行提前实例化全部非延迟单例
    ///
    /// 单个组件的创建失败只记录错误日志，不阻断其余组件。
    /// 返回成功实例化的数量。
    pub fn preinstantiate_eager_singletons(&self) -> usize {
        let eager: Vec<Arc<ComponentDefinition>> = self
            .registry
            .definitions()
            .into_iter()
            .filter(|d| d.scope == ScopeKind::Singleton && !d.lazy)
            .collect();
        if eager.is_empty() {
            return 0;
        }

        let workers = self.config.eager_init_workers.clamp(1, eager.len());
        let succeeded = AtomicUsize::new(0);
        let queue = Mutex::new(eager.into_iter());
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let next = queue.lock().next();
                    let Some(definition) = next else { break };
                    match self.obtain(&definition) {
                        Ok(_) => {
                            succeeded.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            error!(component = %definition.name, error = %err, "提前实例化失败");
                        }
                    }
                });
            }
        });
        let count = succeeded.load(Ordering::Relaxed);
        info!(count, "非延迟单例提前实例化完成");
        count
    }

    /// 结束当前请求边界，清空请求作用域，返回清除的实例数
    pub fn end_request(&self) -> ContainerResult<usize> {
        self.ensure_active()?;
        Ok(self.scopes.manager(ScopeKind::Request)?.clear())
    }

    /// 归还一个原型实例到对象池
    pub fn release_prototype(&self, name: &str, instance: Instance) -> ContainerResult<()> {
        let definition = self.registry.lookup(name)?;
        let pool = self.pools.pool_for(&definition.type_info);
        pool.release(instance, definition.reset_hook.as_ref());
        Ok(())
    }

    /// 为指定原型组件预热对象池到 `count` 个空闲实例
    pub fn warm_up_prototypes(&self, name: &str, count: usize) -> ContainerResult<usize> {
        self.ensure_active()?;
        let definition = self.registry.lookup(name)?;
        let pool = self.pools.pool_for(&definition.type_info);
        pool.warm_up(count, || {
            let _in_flight = InFlightGuard::enter(&definition.name)?;
            self.build_instance(&definition)
        })
    }

    /// 清空元数据缓存
    pub fn clear_metadata_cache(&self) {
        self.metadata.clear();
    }

    /// 当前运行时统计快照
    pub fn statistics(&self) -> ContainerStatistics {
        ContainerStatistics {
            generated_at: Utc::now(),
            definitions: self.registry.len(),
            scopes: self.scopes.all().iter().map(|m| m.statistics()).collect(),
            pools: self.pools.statistics(),
            metadata_cache: self.metadata.statistics(),
        }
    }

    /// 对实例尽力执行销毁回调与销毁方法，失败只记录告警
    fn destroy_instance(&self, name: &str, instance: &Instance, hook: Option<&HookSpec>) {
        for callback in self.callbacks.read().iter() {
            if let Err(err) = callback.before_destruction(name, instance) {
                warn!(component = %name, callback = %callback.name(), error = %err, "销毁回调失败");
            }
        }
        if let Some(hook) = hook {
            if let Err(err) = (hook.func)(instance) {
                warn!(component = %name, hook = %hook.name, error = %err, "销毁方法失败");
            }
        }
    }

    /// 关闭容器
    ///
    /// 幂等。对全部存活实例尽力执行销毁方法（单个失败不影响其余），
    /// 然后停止对象池并释放创建锁表。
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("容器开始关闭");
        for manager in self.scopes.all() {
            for (name, instance) in manager.drain() {
                let definition = self.registry.get(&name);
                let hook = definition.as_ref().and_then(|d| d.destroy_hook.as_ref());
                self.destroy_instance(&name, &instance, hook);
            }
        }
        self.pools.shutdown();
        self.locks.clear();
        debug!("容器关闭完成");
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 容器构建器
#[derive(Default)]
pub struct ContainerBuilder {
    config: ContainerConfig,
    scope_managers: Vec<Arc<dyn ScopeManager>>,
    callbacks: Vec<Arc<dyn LifecycleCallback>>,
    processors: Vec<Arc<dyn ComponentPostProcessor>>,
}

impl ContainerBuilder {
    /// 创建构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置等待其他线程完成创建的上限
    #[must_use]
    pub fn with_creation_wait(mut self, wait: Duration) -> Self {
        self.config.creation_wait = wait;
        self
    }

    /// 设置缓存作用域的分段数
    #[must_use]
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.config.segments = segments;
        self
    }

    /// 设置元数据缓存容量
    #[must_use]
    pub fn with_metadata_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.metadata_cache_capacity = capacity;
        self
    }

    /// 设置原型对象池配置
    #[must_use]
    pub fn with_pool_config(mut self, pool: PoolConfig) -> Self {
        self.config.pool = pool;
        self
    }

    /// 设置提前实例化的并行度
    #[must_use]
    pub fn with_eager_init_workers(mut self, workers: usize) -> Self {
        self.config.eager_init_workers = workers;
        self
    }

    /// 替换某一作用域的管理器
    #[must_use]
    pub fn with_scope_manager(mut self, manager: Arc<dyn ScopeManager>) -> Self {
        self.scope_managers.push(manager);
        self
    }

    /// 追加容器级生命周期回调
    #[must_use]
    pub fn with_lifecycle_callback(mut self, callback: Arc<dyn LifecycleCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    /// 追加组件后置处理器
    #[must_use]
    pub fn with_post_processor(mut self, processor: Arc<dyn ComponentPostProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// 构建容器
    pub fn build(self) -> Container {
        let container = Container::with_config(self.config);
        for manager in self.scope_managers {
            container.scopes.register_manager(manager);
        }
        for callback in self.callbacks {
            container.add_lifecycle_callback(callback);
        }
        for processor in self.processors {
            container.add_post_processor(processor);
        }
        container
    }
}
