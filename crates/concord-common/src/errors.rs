//! 错误类型定义

use std::time::Duration;
use thiserror::Error;

/// 容器错误类型
///
/// 解析/创建错误会一路传播到最初的 `get`/`get_by_type` 调用方，
/// 除显式说明的尽力而为路径外不会被吞掉。
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("组件未注册: {name}{}", format_suggestions(.suggestions))]
    UnknownComponent {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("组件名称已存在: {name}")]
    DuplicateComponent { name: String },

    #[error("类型 {type_name} 存在多个候选组件: {candidates:?}，请使用限定符或标记唯一的 primary")]
    AmbiguousComponent {
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("依赖解析失败: 组件 {requester} 的依赖 '{dependency}' 无法解析，原因: {message}")]
    DependencyResolution {
        requester: String,
        dependency: String,
        message: String,
    },

    #[error("检测到循环依赖: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("组件创建失败: {name}，原因: {source}")]
    ComponentCreation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("不支持的作用域: {scope}")]
    UnsupportedScope { scope: String },

    #[error("参数类型不匹配: 第 {index} 个参数期望 {expected}")]
    ArgumentMismatch { index: usize, expected: String },

    #[error("类型不匹配: 期望 {expected}")]
    TypeMismatch { expected: String },

    #[error("容器已关闭，无法继续提供组件")]
    ContainerUnavailable,
}

impl ContainerError {
    /// 是否为“未找到候选组件”一类的错误
    ///
    /// 可选依赖在这类错误下回退默认值，其余错误（循环依赖、创建失败等）必须继续传播。
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownComponent { .. } | Self::AmbiguousComponent { .. }
        )
    }

    /// 包装组件创建过程中的底层错误
    pub fn creation(
        name: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ComponentCreation {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// 用一条消息构造组件创建错误
    pub fn creation_message(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ComponentCreation {
            name: name.into(),
            source: Box::new(CreationFailure {
                message: message.into(),
            }),
        }
    }

    /// 构造等待其他线程创建超时的错误
    pub fn creation_timeout(name: impl Into<String>, waited: Duration) -> Self {
        Self::creation(
            name,
            CreationWaitTimeout {
                waited_ms: waited.as_millis() as u64,
            },
        )
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("，是否想使用: {}", suggestions.join(", "))
    }
}

/// 组件创建失败的消息型原因
#[derive(Error, Debug)]
#[error("{message}")]
pub struct CreationFailure {
    pub message: String,
}

/// 等待其他线程完成创建超时
#[derive(Error, Debug)]
#[error("等待其他线程完成创建超时: {waited_ms}ms")]
pub struct CreationWaitTimeout {
    pub waited_ms: u64,
}

/// 组件发现错误类型
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("组件扫描失败: {message}")]
    ScanFailed { message: String },

    #[error("定义来源不可用: {source_name}，原因: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },
}

/// 配置绑定错误类型
#[derive(Error, Debug)]
pub enum BindingError {
    #[error("配置键不存在: {key}")]
    KeyNotFound { key: String },

    #[error("配置值类型转换失败: {key}，原因: {message}")]
    TypeConversion { key: String, message: String },
}

/// 结果类型别名
pub type ContainerResult<T> = Result<T, ContainerError>;
pub type ScanResult<T> = Result<T, ScanError>;
pub type BindingResult<T> = Result<T, BindingError>;
