//! 生命周期契约
//!
//! 定义作用域类型与容器级生命周期回调接口

use crate::definition::Instance;
use crate::errors::ContainerResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 组件作用域类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// 单例：容器内唯一实例
    #[default]
    Singleton,
    /// 原型：每次获取都产生新实例
    Prototype,
    /// 请求：一次请求内共享实例
    Request,
}

impl ScopeKind {
    /// 获取作用域名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Singleton => "singleton",
            Self::Prototype => "prototype",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScopeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "singleton" => Ok(Self::Singleton),
            "prototype" => Ok(Self::Prototype),
            "request" => Ok(Self::Request),
            other => Err(format!("未知的作用域类型: {other}")),
        }
    }
}

/// 容器级生命周期回调
///
/// 在每个实例创建完成后、销毁前按 `order` 升序调用。
/// 回调失败会使本次创建失败；销毁路径上的失败只记录日志。
pub trait LifecycleCallback: Send + Sync {
    /// 回调名称（用于日志）
    fn name(&self) -> &str;

    /// 排序值，小者先执行
    fn order(&self) -> i32 {
        0
    }

    /// 实例创建并完成注入后调用
    fn after_creation(&self, component_name: &str, instance: &Instance) -> ContainerResult<()> {
        let _ = (component_name, instance);
        Ok(())
    }

    /// 实例销毁前调用
    fn before_destruction(&self, component_name: &str, instance: &Instance) -> ContainerResult<()> {
        let _ = (component_name, instance);
        Ok(())
    }
}
