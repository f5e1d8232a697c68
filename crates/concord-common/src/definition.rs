//! 组件定义
//!
//! 组件定义在注册后不可变，描述名称、作用域、工厂、依赖声明与生命周期方法。
//! 定义通过 [`ComponentDefinitionBuilder`] 以流式方式构建。

use crate::errors::{ContainerError, ContainerResult};
use crate::lifecycle::ScopeKind;
use crate::metadata::TypeInfo;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 容器托管的组件实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 组件工厂函数
pub type FactoryFn = Arc<dyn Fn(ResolvedArguments) -> ContainerResult<Instance> + Send + Sync>;

/// 生命周期方法函数
pub type HookFn = Arc<dyn Fn(&Instance) -> ContainerResult<()> + Send + Sync>;

/// 注入回调函数，把已解析的值写入实例
pub type InjectorFn = Arc<dyn Fn(&Instance, ResolvedValue) -> ContainerResult<()> + Send + Sync>;

/// 具名的生命周期方法
#[derive(Clone)]
pub struct HookSpec {
    /// 方法名称（用于日志与元数据）
    pub name: String,
    /// 方法实现
    pub func: HookFn,
}

impl fmt::Debug for HookSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSpec").field("name", &self.name).finish()
    }
}

/// 依赖声明
///
/// 构造器参数、字段注入和 setter 注入共用这一描述。
#[derive(Debug, Clone)]
pub struct DependencySpec {
    /// 依赖名称（参数名/字段名）
    pub name: String,
    /// 目标类型
    pub target: TypeInfo,
    /// 是否必需；可选依赖解析失败时回退默认值
    pub required: bool,
    /// 按名称限定依赖的候选组件
    pub qualifier: Option<String>,
    /// 字面值默认值
    pub default: Option<Value>,
}

impl DependencySpec {
    /// 声明一个必需的组件依赖
    pub fn component<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: TypeInfo::of::<T>(),
            required: true,
            qualifier: None,
            default: None,
        }
    }

    /// 声明一个字面值参数
    pub fn literal<T: 'static>(name: impl Into<String>, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            target: TypeInfo::of::<T>(),
            required: default.is_none(),
            qualifier: None,
            default,
        }
    }

    /// 按组件名称限定候选
    #[must_use]
    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// 标记为可选依赖
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// 设置解析失败时的默认值
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// 目标是否为字面值类型
    ///
    /// 字面值类型（布尔、数值、字符串、原始 JSON 集合）永远不会走组件查找，
    /// 直接取默认值填充。
    pub fn is_value_type(&self) -> bool {
        let id = self.target.id;
        id == TypeId::of::<bool>()
            || id == TypeId::of::<i32>()
            || id == TypeId::of::<i64>()
            || id == TypeId::of::<u32>()
            || id == TypeId::of::<u64>()
            || id == TypeId::of::<usize>()
            || id == TypeId::of::<f32>()
            || id == TypeId::of::<f64>()
            || id == TypeId::of::<String>()
            || id == TypeId::of::<Value>()
            || id == TypeId::of::<Vec<Value>>()
            || id == TypeId::of::<HashMap<String, Value>>()
    }
}

/// 带注入回调的依赖声明（字段/setter 注入）
#[derive(Clone)]
pub struct InjectionSpec {
    /// 依赖声明
    pub spec: DependencySpec,
    /// 注入回调
    pub injector: InjectorFn,
}

impl fmt::Debug for InjectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionSpec").field("spec", &self.spec).finish()
    }
}

/// 组件定义
#[derive(Clone)]
pub struct ComponentDefinition {
    /// 组件名称（注册键）
    pub name: String,
    /// 声明类型
    pub type_info: TypeInfo,
    /// 作用域
    pub scope: ScopeKind,
    /// 同类型多候选时优先选用
    pub primary: bool,
    /// 是否延迟初始化（仅单例有意义）
    pub lazy: bool,
    /// 组件工厂
    pub factory: Option<FactoryFn>,
    /// 初始化方法
    pub init_hook: Option<HookSpec>,
    /// 销毁方法
    pub destroy_hook: Option<HookSpec>,
    /// 池化归还时的重置方法
    pub reset_hook: Option<HookSpec>,
    /// 构造器参数声明（按位置）
    pub constructor_args: Vec<DependencySpec>,
    /// 字段注入声明
    pub field_deps: Vec<InjectionSpec>,
    /// setter 注入声明
    pub setter_deps: Vec<InjectionSpec>,
    /// 额外可按类型匹配到本组件的类型
    pub provides: Vec<TypeInfo>,
    /// 附加属性
    pub properties: HashMap<String, Value>,
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("type_info", &self.type_info)
            .field("scope", &self.scope)
            .field("primary", &self.primary)
            .field("lazy", &self.lazy)
            .field("has_factory", &self.factory.is_some())
            .field("constructor_args", &self.constructor_args)
            .field("field_deps", &self.field_deps)
            .field("setter_deps", &self.setter_deps)
            .field("provides", &self.provides)
            .finish()
    }
}

/// 组件定义构建器
///
/// 类型参数固定声明类型，工厂与生命周期方法的闭包按该类型做向下转型。
pub struct ComponentDefinitionBuilder<T: Send + Sync + 'static> {
    definition: ComponentDefinition,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ComponentDefinitionBuilder<T> {
    /// 以默认名称创建构建器
    ///
    /// 默认名称为类型短名首字母小写，如 `DatabaseService` -> `databaseService`。
    pub fn new() -> Self {
        let type_info = TypeInfo::of::<T>();
        let name = default_component_name(type_info.short_name());
        Self::named(name)
    }

    /// 以指定名称创建构建器
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            definition: ComponentDefinition {
                name: name.into(),
                type_info: TypeInfo::of::<T>(),
                scope: ScopeKind::default(),
                primary: false,
                lazy: true,
                factory: None,
                init_hook: None,
                destroy_hook: None,
                reset_hook: None,
                constructor_args: Vec::new(),
                field_deps: Vec::new(),
                setter_deps: Vec::new(),
                provides: Vec::new(),
                properties: HashMap::new(),
            },
            _marker: std::marker::PhantomData,
        }
    }

    /// 设置作用域
    #[must_use]
    pub fn with_scope(mut self, scope: ScopeKind) -> Self {
        self.definition.scope = scope;
        self
    }

    /// 标记为同类型候选中的首选
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.definition.primary = true;
        self
    }

    /// 设置是否延迟初始化
    #[must_use]
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.definition.lazy = lazy;
        self
    }

    /// 设置组件工厂
    #[must_use]
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(ResolvedArguments) -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.definition.factory = Some(Arc::new(move |args| {
            factory(args).map(|instance| Arc::new(instance) as Instance)
        }));
        self
    }

    /// 使用 `Default` 实现作为工厂
    #[must_use]
    pub fn with_default_constructor(self) -> Self
    where
        T: Default,
    {
        self.with_factory(|_| Ok(T::default()))
    }

    /// 追加一个构造器参数声明
    #[must_use]
    pub fn with_constructor_arg(mut self, spec: DependencySpec) -> Self {
        self.definition.constructor_args.push(spec);
        self
    }

    /// 追加一个字段注入声明
    #[must_use]
    pub fn with_field<F>(mut self, spec: DependencySpec, inject: F) -> Self
    where
        F: Fn(&T, ResolvedValue) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.definition.field_deps.push(InjectionSpec {
            spec,
            injector: wrap_injector(inject),
        });
        self
    }

    /// 追加一个 setter 注入声明
    #[must_use]
    pub fn with_setter<F>(mut self, spec: DependencySpec, inject: F) -> Self
    where
        F: Fn(&T, ResolvedValue) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.definition.setter_deps.push(InjectionSpec {
            spec,
            injector: wrap_injector(inject),
        });
        self
    }

    /// 设置初始化方法
    #[must_use]
    pub fn with_init<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&T) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.definition.init_hook = Some(HookSpec {
            name: name.into(),
            func: wrap_hook(hook),
        });
        self
    }

    /// 设置销毁方法
    #[must_use]
    pub fn with_destroy<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&T) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.definition.destroy_hook = Some(HookSpec {
            name: name.into(),
            func: wrap_hook(hook),
        });
        self
    }

    /// 设置池化归还时的重置方法
    #[must_use]
    pub fn with_reset<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&T) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.definition.reset_hook = Some(HookSpec {
            name: name.into(),
            func: wrap_hook(hook),
        });
        self
    }

    /// 声明本组件额外可按类型 `U` 匹配
    #[must_use]
    pub fn provides<U: ?Sized + 'static>(mut self) -> Self {
        self.definition.provides.push(TypeInfo::of::<U>());
        self
    }

    /// 设置附加属性
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.definition.properties.insert(key.into(), value);
        self
    }

    /// 完成构建
    pub fn build(self) -> ComponentDefinition {
        self.definition
    }
}

impl<T: Send + Sync + 'static> Default for ComponentDefinitionBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn wrap_hook<T, F>(hook: F) -> HookFn
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> ContainerResult<()> + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance| {
        let typed = instance
            .downcast_ref::<T>()
            .ok_or_else(|| ContainerError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
            })?;
        hook(typed)
    })
}

fn wrap_injector<T, F>(inject: F) -> InjectorFn
where
    T: Send + Sync + 'static,
    F: Fn(&T, ResolvedValue) -> ContainerResult<()> + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance, value: ResolvedValue| {
        let typed = instance
            .downcast_ref::<T>()
            .ok_or_else(|| ContainerError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
            })?;
        inject(typed, value)
    })
}

fn default_component_name(short_name: &str) -> String {
    let mut chars = short_name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// 已解析的依赖值
#[derive(Clone)]
pub enum ResolvedValue {
    /// 字面值
    Literal(Value),
    /// 组件实例
    Instance(Instance),
}

impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Instance(_) => f.debug_tuple("Instance").finish(),
        }
    }
}

/// 传递给工厂的已解析参数（按声明位置排列）
#[derive(Debug, Clone, Default)]
pub struct ResolvedArguments {
    values: Vec<ResolvedValue>,
}

impl ResolvedArguments {
    /// 从已解析值列表构造
    pub fn new(values: Vec<ResolvedValue>) -> Self {
        Self { values }
    }

    /// 参数个数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 取第 `index` 个参数的组件实例
    pub fn instance<T: Send + Sync + 'static>(&self, index: usize) -> ContainerResult<Arc<T>> {
        let mismatch = || ContainerError::ArgumentMismatch {
            index,
            expected: std::any::type_name::<T>().to_string(),
        };
        match self.values.get(index) {
            Some(ResolvedValue::Instance(instance)) => {
                instance.clone().downcast::<T>().map_err(|_| mismatch())
            }
            _ => Err(mismatch()),
        }
    }

    /// 取第 `index` 个参数的字面值并反序列化
    pub fn literal<T: DeserializeOwned>(&self, index: usize) -> ContainerResult<T> {
        let mismatch = || ContainerError::ArgumentMismatch {
            index,
            expected: std::any::type_name::<T>().to_string(),
        };
        match self.values.get(index) {
            Some(ResolvedValue::Literal(value)) => {
                serde_json::from_value(value.clone()).map_err(|_| mismatch())
            }
            _ => Err(mismatch()),
        }
    }
}
