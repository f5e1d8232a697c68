//! # Concord Common
//!
//! 这个 crate 提供 Concord 容器各层共享的值类型、错误类型和生命周期契约。
//!
//! ## 核心组件
//!
//! - [`ComponentDefinition`] - 组件定义（注册后不可变）
//! - [`DependencySpec`] - 依赖声明（构造器/字段/setter 注入共用）
//! - [`ScopeKind`] - 作用域类型
//! - [`ContainerError`] - 容器错误分类
//!
//! ## 设计原则
//!
//! - 基于 Rust 类型系统的编译时安全
//! - 显式的描述符/构建器，不依赖运行时属性扫描
//! - 注册后定义只读，实例创建路径线程安全

pub mod definition;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use definition::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
