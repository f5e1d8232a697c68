//! 组件定义来源接口

use async_trait::async_trait;
use concord_common::{ComponentDefinition, ScanResult};

/// 组件定义来源接口
///
/// 向容器批量提供组件定义，典型实现有配置文件扫描器、
/// 模块清单和远端注册中心。
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    /// 来源名称（用于日志与错误信息）
    fn name(&self) -> &str;

    /// 加载全部组件定义
    async fn load_definitions(&self) -> ScanResult<Vec<ComponentDefinition>>;
}

/// 定义过滤器
///
/// 在把来源产出喂给容器注册之前做粗粒度筛选。
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    /// 只保留名称带此前缀的定义
    pub name_prefix: Option<String>,
    /// 显式排除的名称
    pub exclude: Vec<String>,
}

impl ScanFilter {
    /// 单条定义是否通过过滤
    pub fn matches(&self, definition: &ComponentDefinition) -> bool {
        if let Some(prefix) = &self.name_prefix {
            if !definition.name.starts_with(prefix.as_str()) {
                return false;
            }
        }
        !self.exclude.iter().any(|name| name == &definition.name)
    }

    /// 过滤一批定义
    pub fn apply(&self, definitions: Vec<ComponentDefinition>) -> Vec<ComponentDefinition> {
        definitions
            .into_iter()
            .filter(|definition| self.matches(definition))
            .collect()
    }
}
