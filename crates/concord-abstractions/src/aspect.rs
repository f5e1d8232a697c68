//! 组件后置处理器接口

use concord_common::{ContainerResult, Instance};

/// 组件后置处理器接口
///
/// 在实例完成注入与初始化方法后调用，可以原样返回实例，
/// 也可以返回替换后的实例（如包装代理）。处理器按 `order`
/// 升序串联，任一处理器失败会使本次创建失败。
pub trait ComponentPostProcessor: Send + Sync {
    /// 处理器名称（用于日志）
    fn name(&self) -> &str;

    /// 排序值，小者先执行
    fn order(&self) -> i32 {
        0
    }

    /// 处理刚创建完成的实例
    fn post_process(&self, component_name: &str, instance: Instance)
        -> ContainerResult<Instance>;
}
