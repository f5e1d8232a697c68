//! 创建协调
//!
//! 保证同一名称在并发下只物理构造一次：按名称的创建锁表负责
//! 互斥，线程本地的在建链负责在拿锁之前发现循环依赖。创建流程
//! 为 实例化 → 字段/setter 注入 → 初始化方法 → 生命周期回调 →
//! 后置处理器 → 发布。

use crate::container::Container;
use concord_abstractions::ScopeManager;
use concord_common::{
    ComponentDefinition, ContainerError, ContainerResult, Instance, ResolvedValue,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{debug, warn};

/// 按名称的创建锁表，锁条目按需懒创建
pub(crate) struct CreationLockTable {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CreationLockTable {
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// 取（或创建）指定名称的创建锁
    pub(crate) fn entry(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(crate) fn clear(&self) {
        self.locks.clear();
    }
}

thread_local! {
    /// 当前线程解析链上的在建名称，声明顺序即依赖顺序
    static IN_FLIGHT: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// 在建链的 RAII 守卫
///
/// 进入时发现名称已在链上即报循环依赖，错误携带从首次出现到
/// 当前的完整链。任何退出路径都由 `Drop` 摘除名称。
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    name: String,
}

impl InFlightGuard {
    pub(crate) fn enter(name: &str) -> ContainerResult<Self> {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().position(|pending| pending == name) {
                return Err(ContainerError::CircularDependency {
                    chain: stack[position..].to_vec(),
                });
            }
            stack.push(name.to_string());
            Ok(Self {
                name: name.to_string(),
            })
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().rposition(|pending| pending == &self.name) {
                stack.remove(position);
            }
        });
    }
}

/// 把创建路径上的错误包装为组件创建错误，已包装过的原样传播
fn wrap_creation(name: &str, error: ContainerError) -> ContainerError {
    match error {
        wrapped @ ContainerError::ComponentCreation { .. } => wrapped,
        other => ContainerError::creation(name, other),
    }
}

impl Container {
    /// 按定义取实例：缓存作用域走快路径，原型走对象池
    pub(crate) fn obtain(
        &self,
        definition: &Arc<ComponentDefinition>,
    ) -> ContainerResult<Instance> {
        let manager = self.scopes.manager(definition.scope)?;
        if manager.caches_instances() {
            if let Some(instance) = manager.lookup(&definition.name) {
                return Ok(instance);
            }
            self.create_cached(definition, manager.as_ref())
        } else {
            self.create_pooled(definition, manager.as_ref())
        }
    }

    /// 缓存作用域的慢路径：先登记在建链，再竞争创建锁
    fn create_cached(
        &self,
        definition: &Arc<ComponentDefinition>,
        manager: &dyn ScopeManager,
    ) -> ContainerResult<Instance> {
        let _in_flight = InFlightGuard::enter(&definition.name)?;
        let lock = self.locks.entry(&definition.name);

        if let Some(_held) = lock.try_lock() {
            // 拿到锁后双重检查，输掉竞争的线程可能已经等到发布
            if let Some(instance) = manager.lookup(&definition.name) {
                return Ok(instance);
            }
            let instance = self.build_instance(definition)?;
            manager.publish(&definition.name, instance.clone());
            debug!(component = %definition.name, scope = %definition.scope, "组件实例已发布");
            return Ok(instance);
        }

        // 有界等待持锁线程完成创建；守卫在本语句结束即释放
        let outcome = match lock.try_lock_for(self.config.creation_wait) {
            Some(_held) => manager.lookup(&definition.name).ok_or_else(|| {
                ContainerError::creation_message(
                    &definition.name,
                    "持锁线程结束后仍未发布实例",
                )
            }),
            None => Err(ContainerError::creation_timeout(
                &definition.name,
                self.config.creation_wait,
            )),
        };
        outcome
    }

    /// 原型路径：对象池优先复用空闲实例
    fn create_pooled(
        &self,
        definition: &Arc<ComponentDefinition>,
        manager: &dyn ScopeManager,
    ) -> ContainerResult<Instance> {
        let _in_flight = InFlightGuard::enter(&definition.name)?;
        let pool = self.pools.pool_for(&definition.type_info);
        let instance = pool.acquire(|| self.build_instance(definition))?;
        manager.publish(&definition.name, instance.clone());
        Ok(instance)
    }

    /// 实例化 → 注入 → 初始化方法 → 回调 → 后置处理器
    pub(crate) fn build_instance(
        &self,
        definition: &Arc<ComponentDefinition>,
    ) -> ContainerResult<Instance> {
        debug!(component = %definition.name, "开始创建组件实例");
        let metadata = self.metadata.metadata_for(definition);
        let arguments = self.resolve_arguments(definition, &metadata)?;

        let factory = definition.factory.as_ref().ok_or_else(|| {
            ContainerError::creation_message(&definition.name, "未提供组件工厂")
        })?;
        let instance = factory(arguments).map_err(|error| wrap_creation(&definition.name, error))?;

        self.inject(definition, &instance)?;

        if let Some(hook) = &definition.init_hook {
            (hook.func)(&instance).map_err(|error| wrap_creation(&definition.name, error))?;
        }

        let mut instance = instance;
        for callback in self.callbacks.read().iter() {
            callback
                .after_creation(&definition.name, &instance)
                .map_err(|error| wrap_creation(&definition.name, error))?;
        }
        for processor in self.processors.read().iter() {
            instance = processor
                .post_process(&definition.name, instance)
                .map_err(|error| wrap_creation(&definition.name, error))?;
        }
        Ok(instance)
    }

    /// 执行字段与 setter 注入
    ///
    /// 必需依赖的注入失败使创建失败；可选依赖失败只记录告警。
    fn inject(
        &self,
        definition: &Arc<ComponentDefinition>,
        instance: &Instance,
    ) -> ContainerResult<()> {
        let injections = definition.field_deps.iter().chain(&definition.setter_deps);
        for injection in injections {
            let spec = &injection.spec;
            let value: ResolvedValue =
                self.resolve_spec(&definition.name, spec, spec.is_value_type())?;
            if let Err(error) = (injection.injector)(instance, value) {
                if spec.required {
                    return Err(wrap_creation(&definition.name, error));
                }
                warn!(
                    component = %definition.name,
                    dependency = %spec.name,
                    %error,
                    "可选依赖注入失败，跳过"
                );
            }
        }
        Ok(())
    }
}
