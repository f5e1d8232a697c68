//! 组件定义注册表
//!
//! 按名称存储组件定义，并维护声明类型与附加提供类型两级索引。
//! 注册完成后以读为主，使用读写锁保护。

use concord_common::{ComponentDefinition, ContainerError, ContainerResult, TypeInfo};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 相似名称建议的最低相似度
const SUGGESTION_THRESHOLD: f64 = 0.6;

/// 最多返回的建议条数
const SUGGESTION_LIMIT: usize = 3;

#[derive(Default)]
struct RegistryState {
    definitions: HashMap<String, Arc<ComponentDefinition>>,
    by_type: HashMap<TypeId, Vec<String>>,
    by_provides: HashMap<TypeId, Vec<String>>,
}

impl RegistryState {
    fn index(&mut self, definition: &Arc<ComponentDefinition>) {
        self.by_type
            .entry(definition.type_info.id)
            .or_default()
            .push(definition.name.clone());
        for provided in &definition.provides {
            self.by_provides
                .entry(provided.id)
                .or_default()
                .push(definition.name.clone());
        }
    }

    fn unindex(&mut self, definition: &ComponentDefinition) {
        if let Some(names) = self.by_type.get_mut(&definition.type_info.id) {
            names.retain(|n| n != &definition.name);
            if names.is_empty() {
                self.by_type.remove(&definition.type_info.id);
            }
        }
        for provided in &definition.provides {
            if let Some(names) = self.by_provides.get_mut(&provided.id) {
                names.retain(|n| n != &definition.name);
                if names.is_empty() {
                    self.by_provides.remove(&provided.id);
                }
            }
        }
    }
}

/// 组件定义注册表
#[derive(Default)]
pub struct DefinitionRegistry {
    state: RwLock<RegistryState>,
}

impl DefinitionRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册组件定义，名称重复时拒绝
    pub fn register(&self, definition: ComponentDefinition) -> ContainerResult<()> {
        let mut state = self.state.write();
        if state.definitions.contains_key(&definition.name) {
            return Err(ContainerError::DuplicateComponent {
                name: definition.name,
            });
        }
        debug!(component = %definition.name, scope = %definition.scope, "注册组件定义");
        let definition = Arc::new(definition);
        state.index(&definition);
        state.definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// 注册组件定义，名称重复时替换旧定义
    ///
    /// 返回被替换掉的旧定义（如果有）。
    pub fn register_or_replace(
        &self,
        definition: ComponentDefinition,
    ) -> Option<Arc<ComponentDefinition>> {
        let mut state = self.state.write();
        let previous = state.definitions.remove(&definition.name);
        if let Some(old) = &previous {
            debug!(component = %definition.name, "替换已有组件定义");
            state.unindex(old);
        }
        let definition = Arc::new(definition);
        state.index(&definition);
        state.definitions.insert(definition.name.clone(), definition);
        previous
    }

    /// 注销组件定义，返回被移除的定义
    pub fn deregister(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        let mut state = self.state.write();
        let removed = state.definitions.remove(name);
        if let Some(definition) = &removed {
            state.unindex(definition);
        }
        removed
    }

    /// 按名称查找，未注册时附带相似名称建议
    pub fn lookup(&self, name: &str) -> ContainerResult<Arc<ComponentDefinition>> {
        let state = self.state.read();
        state
            .definitions
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::UnknownComponent {
                name: name.to_string(),
                suggestions: suggest_similar(name, state.definitions.keys()),
            })
    }

    /// 按名称查找（无错误构造）
    pub fn get(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        self.state.read().definitions.get(name).cloned()
    }

    /// 是否已注册指定名称
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().definitions.contains_key(name)
    }

    /// 全部已注册名称
    pub fn names(&self) -> Vec<String> {
        self.state.read().definitions.keys().cloned().collect()
    }

    /// 已注册定义数量
    pub fn len(&self) -> usize {
        self.state.read().definitions.len()
    }

    /// 是否没有任何定义
    pub fn is_empty(&self) -> bool {
        self.state.read().definitions.is_empty()
    }

    /// 全部已注册定义
    pub fn definitions(&self) -> Vec<Arc<ComponentDefinition>> {
        self.state.read().definitions.values().cloned().collect()
    }

    /// 按类型列出候选组件名称
    ///
    /// 优先按声明类型精确匹配；没有精确候选时回退到声明了
    /// `provides` 该类型的实现组件。
    pub fn candidates_by_type(&self, target: &TypeInfo) -> Vec<String> {
        let state = self.state.read();
        if let Some(names) = state.by_type.get(&target.id) {
            if !names.is_empty() {
                return names.clone();
            }
        }
        state
            .by_provides
            .get(&target.id)
            .cloned()
            .unwrap_or_default()
    }

    /// 按类型选出唯一的组件定义
    ///
    /// 有限定符时在候选中按名称精确匹配；否则唯一候选直接命中，
    /// 多候选要求恰好一个 `primary`。
    pub fn select_by_type(
        &self,
        target: &TypeInfo,
        qualifier: Option<&str>,
    ) -> ContainerResult<Arc<ComponentDefinition>> {
        let candidates = self.candidates_by_type(target);
        if candidates.is_empty() {
            return Err(ContainerError::UnknownComponent {
                name: target.name.clone(),
                suggestions: Vec::new(),
            });
        }

        if let Some(qualifier) = qualifier {
            if candidates.iter().any(|c| c == qualifier) {
                return self.lookup(qualifier);
            }
            return Err(ContainerError::UnknownComponent {
                name: qualifier.to_string(),
                suggestions: candidates,
            });
        }

        if candidates.len() == 1 {
            return self.lookup(&candidates[0]);
        }

        let state = self.state.read();
        let primaries: Vec<&String> = candidates
            .iter()
            .filter(|name| {
                state
                    .definitions
                    .get(*name)
                    .is_some_and(|d| d.primary)
            })
            .collect();
        match primaries.as_slice() {
            [single] => {
                let name = (*single).clone();
                drop(state);
                self.lookup(&name)
            }
            _ => Err(ContainerError::AmbiguousComponent {
                type_name: target.name.clone(),
                candidates,
            }),
        }
    }
}

/// 从已注册名称中挑出与 `name` 相近的建议
fn suggest_similar<'a>(name: &str, registered: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut scored: Vec<(f64, String)> = registered
        .filter_map(|candidate| {
            let score = if candidate.eq_ignore_ascii_case(name) {
                1.0
            } else {
                similarity(name, candidate)
            };
            (score >= SUGGESTION_THRESHOLD).then(|| (score, candidate.clone()))
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.truncate(SUGGESTION_LIMIT);
    scored.into_iter().map(|(_, name)| name).collect()
}

/// 归一化编辑距离相似度，1.0 表示完全相同
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - (edit_distance(a, b) as f64) / (longest as f64)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut previous_diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous_diagonal + usize::from(ca != cb);
            previous_diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(previous_diagonal + 1);
        }
    }
    row[b.len()]
}
