//! # Concord Abstractions
//!
//! 容器扩展点抽象层，定义作用域管理与外部协作者的核心接口。
//!
//! ## 核心接口
//!
//! - [`ScopeManager`] - 作用域管理器接口
//! - [`DefinitionSource`] - 组件定义来源接口
//! - [`PropertyResolver`] - 配置属性解析接口
//! - [`ComponentPostProcessor`] - 组件后置处理器接口

pub mod aspect;
pub mod binder;
pub mod scanner;
pub mod scope;

pub use aspect::*;
pub use binder::*;
pub use scanner::*;
pub use scope::*;
