//! 元数据定义
//!
//! 提供组件声明类型与构造器/方法签名的元数据信息

use std::any::TypeId;

/// 类型信息
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// 类型名称（含模块路径）
    pub name: String,
    /// 类型ID
    pub id: TypeId,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>().to_string(),
            id: TypeId::of::<T>(),
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        self.name.split("::").last().unwrap_or(&self.name)
    }
}

/// 构造器参数元数据
#[derive(Debug, Clone)]
pub struct ParameterMetadata {
    /// 参数名称
    pub name: String,
    /// 目标类型
    pub target: TypeInfo,
    /// 是否必需
    pub required: bool,
    /// 是否为字面值类型（布尔、字符串、数值、原始集合）
    pub value_typed: bool,
    /// 是否声明了默认值
    pub has_default: bool,
}

/// 构造器元数据
///
/// 参数保持声明顺序，创建时按位置拼接进构造调用。
#[derive(Debug, Clone, Default)]
pub struct ConstructorMetadata {
    pub parameters: Vec<ParameterMetadata>,
}

/// 生命周期方法种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// 初始化方法
    Init,
    /// 销毁方法
    Destroy,
    /// 池化重置方法
    Reset,
}

/// 方法签名元数据
#[derive(Debug, Clone)]
pub struct MethodMetadata {
    /// 方法名称
    pub name: String,
    /// 方法种类
    pub kind: HookKind,
}

/// 类型元数据（元数据缓存条目）
#[derive(Debug, Clone)]
pub struct TypeMetadata {
    /// 声明类型
    pub type_info: TypeInfo,
    /// 构造器元数据
    pub constructor: ConstructorMetadata,
    /// 选定的生命周期方法签名
    pub methods: Vec<MethodMetadata>,
}
