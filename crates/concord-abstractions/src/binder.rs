//! 配置属性解析接口

use async_trait::async_trait;
use concord_common::{BindingResult, ComponentDefinition};
use serde_json::Value;

/// 配置属性解析接口
///
/// 按键查找配置值，用于在注册前补全定义里缺失的字面值默认值。
#[async_trait]
pub trait PropertyResolver: Send + Sync {
    /// 解析指定键的配置值，不存在时返回 `None`
    async fn resolve(&self, key: &str) -> BindingResult<Option<Value>>;

    /// 用配置值补全定义中缺省的字面值参数
    ///
    /// 查找键为 `<组件名>.<参数名>`。已有默认值的参数不会被覆盖。
    async fn bind_defaults(&self, definition: &mut ComponentDefinition) -> BindingResult<()> {
        let component = definition.name.clone();
        for spec in definition
            .constructor_args
            .iter_mut()
            .filter(|spec| spec.is_value_type() && spec.default.is_none())
        {
            let key = format!("{component}.{}", spec.name);
            if let Some(value) = self.resolve(&key).await? {
                spec.default = Some(value);
            }
        }
        Ok(())
    }
}
