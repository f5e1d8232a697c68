//! 原型实例对象池
//!
//! 每个声明类型一个有界空闲队列。归还时执行可选的重置方法，
//! 重置失败丢弃实例而不是向调用方抛错。后台清扫线程按空闲
//! 超时淘汰实例。

use concord_common::{ContainerResult, HookSpec, Instance, TypeInfo};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 对象池配置
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// 预热下限：`warm_up` 会把空闲实例补足到该数量
    pub min_size: usize,
    /// 空闲实例数量上限，超出的归还直接丢弃
    pub max_size: usize,
    /// 空闲超时，超过后由清扫线程淘汰
    pub max_idle: Duration,
    /// 清扫线程的扫描间隔
    pub sweep_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: 50,
            max_idle: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct IdleEntry {
    instance: Instance,
    parked_at: Instant,
}

/// 单个池的统计信息
#[derive(Debug, Clone)]
pub struct PoolStatistics {
    /// 池所属类型名称
    pub type_name: String,
    /// 当前空闲实例数
    pub idle: usize,
    /// 工厂创建次数
    pub created: u64,
    /// 空闲复用次数
    pub reused: u64,
    /// 丢弃次数（重置失败或超出容量）
    pub discarded: u64,
    /// 空闲超时淘汰次数
    pub evicted: u64,
    /// 复用命中率
    pub hit_rate: f64,
}

/// 单类型对象池
pub struct ObjectPool {
    type_name: String,
    max_size: AtomicUsize,
    max_idle: Duration,
    idle: Mutex<VecDeque<IdleEntry>>,
    created: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
    evicted: AtomicU64,
}

impl ObjectPool {
    /// 为指定类型创建对象池
    pub fn new(type_name: impl Into<String>, config: &PoolConfig) -> Self {
        Self {
            type_name: type_name.into(),
            max_size: AtomicUsize::new(config.max_size),
            max_idle: config.max_idle,
            idle: Mutex::new(VecDeque::new()),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// 取一个实例：优先弹出空闲实例，否则调用工厂
    pub fn acquire(
        &self,
        factory: impl FnOnce() -> ContainerResult<Instance>,
    ) -> ContainerResult<Instance> {
        if let Some(entry) = self.idle.lock().pop_front() {
            self.reused.fetch_add(1, Ordering::Relaxed);
            return Ok(entry.instance);
        }
        let instance = factory()?;
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(instance)
    }

    /// 归还一个实例
    ///
    /// 先执行重置方法；重置失败丢弃该实例并记录告警，不向调用方传播。
    /// 池已满时同样丢弃。
    pub fn release(&self, instance: Instance, reset_hook: Option<&HookSpec>) {
        if let Some(hook) = reset_hook {
            if let Err(error) = (hook.func)(&instance) {
                warn!(
                    pool = %self.type_name,
                    hook = %hook.name,
                    %error,
                    "重置方法失败，丢弃归还的实例"
                );
                self.discarded.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_size.load(Ordering::Relaxed) {
            idle.push_back(IdleEntry {
                instance,
                parked_at: Instant::now(),
            });
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 用工厂把空闲实例补足到 `min_size`
    ///
    /// 工厂在不持有空闲锁的情况下调用：创建过程可能递归解析
    /// 依赖并重新进入同一个池。
    pub fn warm_up(
        &self,
        min_size: usize,
        mut factory: impl FnMut() -> ContainerResult<Instance>,
    ) -> ContainerResult<usize> {
        let mut warmed = 0;
        loop {
            if self.idle.lock().len() >= min_size {
                break;
            }
            let instance = factory()?;
            self.created.fetch_add(1, Ordering::Relaxed);

            let mut idle = self.idle.lock();
            if idle.len() >= min_size {
                // 并发预热已补足目标，多出的实例丢弃
                self.discarded.fetch_add(1, Ordering::Relaxed);
                break;
            }
            idle.push_back(IdleEntry {
                instance,
                parked_at: Instant::now(),
            });
            warmed += 1;
        }
        Ok(warmed)
    }

    /// 调整空闲容量上限，收缩时立即丢弃多出的空闲实例
    pub fn resize(&self, max_size: usize) {
        self.max_size.store(max_size, Ordering::Relaxed);
        let mut idle = self.idle.lock();
        while idle.len() > max_size {
            idle.pop_front();
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 淘汰空闲超时的实例，返回淘汰数量
    pub fn evict_idle(&self) -> usize {
        let mut idle = self.idle.lock();
        let before = idle.len();
        idle.retain(|entry| entry.parked_at.elapsed() <= self.max_idle);
        let evicted = before - idle.len();
        if evicted > 0 {
            self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(pool = %self.type_name, evicted, "淘汰空闲超时实例");
        }
        evicted
    }

    /// 清空全部空闲实例
    pub fn clear(&self) -> usize {
        let mut idle = self.idle.lock();
        let count = idle.len();
        idle.clear();
        count
    }

    /// 当前统计信息
    pub fn statistics(&self) -> PoolStatistics {
        let created = self.created.load(Ordering::Relaxed);
        let reused = self.reused.load(Ordering::Relaxed);
        let total = created + reused;
        PoolStatistics {
            type_name: self.type_name.clone(),
            idle: self.idle.lock().len(),
            created,
            reused,
            discarded: self.discarded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            hit_rate: if total == 0 {
                0.0
            } else {
                reused as f64 / total as f64
            },
        }
    }
}

/// 原型作用域的池管理器
///
/// 按声明类型维护一组对象池，并持有一个后台清扫线程。
pub struct PrototypePoolManager {
    config: PoolConfig,
    pools: Arc<DashMap<TypeId, Arc<ObjectPool>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<(Mutex<bool>, Condvar)>,
}

impl PrototypePoolManager {
    /// 创建池管理器并启动清扫线程
    pub fn new(config: PoolConfig) -> Self {
        let manager = Self {
            config,
            pools: Arc::new(DashMap::new()),
            sweeper: Mutex::new(None),
            stop: Arc::new((Mutex::new(false), Condvar::new())),
        };
        manager.start_sweeper();
        manager
    }

    fn start_sweeper(&self) {
        let pools = Arc::clone(&self.pools);
        let stop = Arc::clone(&self.stop);
        let interval = self.config.sweep_interval;
        let handle = std::thread::Builder::new()
            .name("concord-pool-sweeper".to_string())
            .spawn(move || {
                let (lock, condvar) = &*stop;
                let mut stopped = lock.lock();
                loop {
                    condvar.wait_for(&mut stopped, interval);
                    if *stopped {
                        break;
                    }
                    for pool in pools.iter() {
                        pool.evict_idle();
                    }
                }
            });
        match handle {
            Ok(handle) => *self.sweeper.lock() = Some(handle),
            Err(error) => warn!(%error, "清扫线程启动失败，空闲淘汰不可用"),
        }
    }

    /// 取（或创建）指定类型的对象池
    pub fn pool_for(&self, type_info: &TypeInfo) -> Arc<ObjectPool> {
        self.pools
            .entry(type_info.id)
            .or_insert_with(|| Arc::new(ObjectPool::new(type_info.name.clone(), &self.config)))
            .clone()
    }

    /// 池配置
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 清空指定类型的池（不存在时不创建），返回丢弃的空闲实例数
    pub fn clear_type(&self, type_info: &TypeInfo) -> usize {
        self.pools
            .get(&type_info.id)
            .map_or(0, |pool| pool.clear())
    }

    /// 按类型名称聚合全部池的统计信息
    pub fn statistics(&self) -> HashMap<String, PoolStatistics> {
        self.pools
            .iter()
            .map(|pool| {
                let stats = pool.statistics();
                (stats.type_name.clone(), stats)
            })
            .collect()
    }

    /// 停止清扫线程并清空全部池
    pub fn shutdown(&self) {
        {
            let (lock, condvar) = &*self.stop;
            *lock.lock() = true;
            condvar.notify_all();
        }
        if let Some(handle) = self.sweeper.lock().take() {
            if handle.join().is_err() {
                warn!("清扫线程异常退出");
            }
        }
        for pool in self.pools.iter() {
            pool.clear();
        }
        self.pools.clear();
    }
}

impl Default for PrototypePoolManager {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
