//! 依赖解析
//!
//! 逐条解析定义声明的依赖：字面值参数直接取默认值，绝不触发
//! 组件查找；其余先按限定符（精确名称）再按声明类型解析。
//! 输出保持声明顺序，按位置送入构造工厂。

use crate::container::Container;
use concord_common::{
    ComponentDefinition, ContainerError, ContainerResult, DependencySpec, ResolvedArguments,
    ResolvedValue, TypeMetadata,
};
use serde_json::Value;

impl Container {
    /// 按声明顺序解析全部构造器参数
    pub(crate) fn resolve_arguments(
        &self,
        definition: &ComponentDefinition,
        metadata: &TypeMetadata,
    ) -> ContainerResult<ResolvedArguments> {
        let parameters = &metadata.constructor.parameters;
        let mut values = Vec::with_capacity(definition.constructor_args.len());
        for (index, spec) in definition.constructor_args.iter().enumerate() {
            // 每条声明都必须解析；元数据对不上时直接从声明推导
            let value_typed = parameters
                .get(index)
                .map_or_else(|| spec.is_value_type(), |p| p.value_typed);
            values.push(self.resolve_spec(&definition.name, spec, value_typed)?);
        }
        Ok(ResolvedArguments::new(values))
    }

    /// 解析单条依赖声明
    pub(crate) fn resolve_spec(
        &self,
        requester: &str,
        spec: &DependencySpec,
        value_typed: bool,
    ) -> ContainerResult<ResolvedValue> {
        if value_typed {
            return Ok(ResolvedValue::Literal(
                spec.default.clone().unwrap_or(Value::Null),
            ));
        }

        let outcome = match &spec.qualifier {
            Some(qualifier) => self.get(qualifier),
            None => self.get_by_type_info(&spec.target),
        };
        match outcome {
            Ok(instance) => Ok(ResolvedValue::Instance(instance)),
            Err(error) if error.is_not_found() => {
                if spec.required {
                    Err(ContainerError::DependencyResolution {
                        requester: requester.to_string(),
                        dependency: spec.name.clone(),
                        message: error.to_string(),
                    })
                } else {
                    // 可选依赖回退默认值
                    Ok(ResolvedValue::Literal(
                        spec.default.clone().unwrap_or(Value::Null),
                    ))
                }
            }
            // 循环依赖、创建失败等必须原样传播
            Err(error) => Err(error),
        }
    }

    /// 校验全部已注册定义的依赖可达性，不实例化任何组件
    ///
    /// 返回发现的全部问题；空结果表示通过。
    pub fn validate(&self) -> Vec<ContainerError> {
        let mut problems = Vec::new();
        for definition in self.registry.definitions() {
            let specs = definition
                .constructor_args
                .iter()
                .chain(definition.field_deps.iter().map(|i| &i.spec))
                .chain(definition.setter_deps.iter().map(|i| &i.spec));
            for spec in specs {
                if spec.is_value_type() || !spec.required {
                    continue;
                }
                let resolvable = match &spec.qualifier {
                    Some(qualifier) => self.registry.lookup(qualifier).map(|_| ()),
                    None => self.registry.select_by_type(&spec.target, None).map(|_| ()),
                };
                if let Err(error) = resolvable {
                    problems.push(ContainerError::DependencyResolution {
                        requester: definition.name.clone(),
                        dependency: spec.name.clone(),
                        message: error.to_string(),
                    });
                }
            }
        }
        problems
    }
}
