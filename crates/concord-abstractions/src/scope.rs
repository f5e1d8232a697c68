//! 作用域管理器接口

use concord_common::{Instance, ScopeKind};

/// 作用域实例统计信息
#[derive(Debug, Clone)]
pub struct ScopeStatistics {
    /// 作用域类型
    pub kind: ScopeKind,
    /// 当前缓存的实例数
    pub instance_count: usize,
    /// 累计发布/创建的实例数
    pub created_total: u64,
}

/// 作用域管理器接口
///
/// 管理某一作用域下组件实例的缓存与回收。实现必须线程安全：
/// `lookup`/`publish` 会被多个解析线程并发调用。
pub trait ScopeManager: Send + Sync {
    /// 本管理器负责的作用域
    fn kind(&self) -> ScopeKind;

    /// 是否缓存实例
    ///
    /// 返回 `false` 的作用域（如原型）每次获取都产生新实例，
    /// 容器不会对其走缓存快路径，也不会施加按名称的创建锁。
    fn caches_instances(&self) -> bool {
        true
    }

    /// 按名称查找已缓存的实例
    fn lookup(&self, name: &str) -> Option<Instance>;

    /// 发布一个新创建的实例
    fn publish(&self, name: &str, instance: Instance);

    /// 移除并返回指定名称的实例
    fn remove(&self, name: &str) -> Option<Instance>;

    /// 清空全部实例，返回清除数量
    fn clear(&self) -> usize;

    /// 取出全部实例（用于关闭时执行销毁方法）
    fn drain(&self) -> Vec<(String, Instance)>;

    /// 当前统计信息
    fn statistics(&self) -> ScopeStatistics;
}
