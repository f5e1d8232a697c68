//! # Concord Core
//!
//! 线程安全的组件容器核心实现。
//!
//! ## 核心组件
//!
//! - [`DefinitionRegistry`] - 组件定义注册表
//! - [`ScopeRegistry`] - 作用域管理器注册表
//! - [`Container`] - 容器门面（注册、获取、关闭）
//! - [`ObjectPool`] - 原型实例对象池
//! - [`MetadataCache`] - 类型元数据缓存
//!
//! ## 并发保证
//!
//! - 同一名称在并发首次获取下只会物理构造一次
//! - 循环依赖在锁获取之前按解析链检测并报错，不会死锁
//! - 等待其他线程完成创建的阻塞有可配置的上限

pub mod container;
pub mod coordinator;
pub mod metadata_cache;
pub mod pool;
pub mod registry;
pub mod resolver;
pub mod scope;

pub use container::*;
pub use metadata_cache::*;
pub use pool::*;
pub use registry::*;
pub use scope::*;
