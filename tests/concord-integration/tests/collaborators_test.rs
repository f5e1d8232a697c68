//! 外部协作者接口（定义来源 / 配置解析 / 后置处理器 / 生命周期回调）的集成测试
use async_trait::async_trait;
use concord_abstractions::{ComponentPostProcessor, DefinitionSource, PropertyResolver};
use concord_common::{
    BindingResult, ComponentDefinition, ComponentDefinitionBuilder, ContainerResult,
    DependencySpec, Instance, LifecycleCallback, ResolvedArguments, ScanResult,
};
use concord_core::Container;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

struct HttpClient {
    timeout_ms: u64,
}

/// 固定返回一批定义的来源
struct StaticSource {
    definitions: Mutex<Vec<ComponentDefinition>>,
}

#[async_trait]
impl DefinitionSource for StaticSource {
    fn name(&self) -> &str {
        "static-source"
    }

    async fn load_definitions(&self) -> ScanResult<Vec<ComponentDefinition>> {
        Ok(std::mem::take(&mut *self.definitions.lock()))
    }
}

/// 基于内存表的配置解析器
struct MapResolver {
    values: HashMap<String, Value>,
}

#[async_trait]
impl PropertyResolver for MapResolver {
    async fn resolve(&self, key: &str) -> BindingResult<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }
}

fn http_client_definition() -> ComponentDefinition {
    ComponentDefinitionBuilder::<HttpClient>::named("httpClient")
        .with_constructor_arg(DependencySpec::literal::<u64>("timeout_ms", None))
        .with_factory(|args: ResolvedArguments| {
            Ok(HttpClient {
                timeout_ms: args.literal::<u64>(0)?,
            })
        })
        .build()
}

#[tokio::test]
async fn test_definition_source_feeds_register() {
    let source = StaticSource {
        definitions: Mutex::new(vec![ComponentDefinitionBuilder::<HttpClient>::named(
            "httpClient",
        )
        .with_factory(|_| Ok(HttpClient { timeout_ms: 30 }))
        .build()]),
    };

    let container = Container::new();
    for definition in source.load_definitions().await.unwrap() {
        container.register(definition).unwrap();
    }
    let client = container.get_typed::<HttpClient>("httpClient").unwrap();
    assert_eq!(client.timeout_ms, 30);
}

#[tokio::test]
async fn test_property_resolver_binds_missing_defaults() {
    let resolver = MapResolver {
        values: HashMap::from([("httpClient.timeout_ms".to_string(), json!(2500))]),
    };

    let mut definition = http_client_definition();
    resolver.bind_defaults(&mut definition).await.unwrap();

    let container = Container::new();
    container.register(definition).unwrap();
    let client = container.get_typed::<HttpClient>("httpClient").unwrap();
    assert_eq!(client.timeout_ms, 2500);
}

struct Greeting {
    text: String,
}

/// 把问候语改写成大写的后置处理器
struct UppercaseProcessor;

impl ComponentPostProcessor for UppercaseProcessor {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn post_process(&self, _component_name: &str, instance: Instance) -> ContainerResult<Instance> {
        match instance.downcast_ref::<Greeting>() {
            Some(greeting) => Ok(Arc::new(Greeting {
                text: greeting.text.to_uppercase(),
            })),
            None => Ok(instance),
        }
    }
}

#[test]
fn test_post_processor_may_replace_instance() {
    let container = Container::builder()
        .with_post_processor(Arc::new(UppercaseProcessor))
        .build();
    container
        .register(
            ComponentDefinitionBuilder::<Greeting>::named("greeting")
                .with_factory(|_| {
                    Ok(Greeting {
                        text: "hello".to_string(),
                    })
                })
                .build(),
        )
        .unwrap();

    let greeting = container.get_typed::<Greeting>("greeting").unwrap();
    assert_eq!(greeting.text, "HELLO");
}

/// 把自己的名字记到共享日志里的回调
struct RecordingCallback {
    label: &'static str,
    order: i32,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl LifecycleCallback for RecordingCallback {
    fn name(&self) -> &str {
        self.label
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn after_creation(&self, _component_name: &str, _instance: &Instance) -> ContainerResult<()> {
        self.log.lock().push(self.label);
        Ok(())
    }
}

#[test]
fn test_lifecycle_callbacks_run_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::builder()
        .with_lifecycle_callback(Arc::new(RecordingCallback {
            label: "second",
            order: 10,
            log: Arc::clone(&log),
        }))
        .with_lifecycle_callback(Arc::new(RecordingCallback {
            label: "first",
            order: -10,
            log: Arc::clone(&log),
        }))
        .build();
    container
        .register(
            ComponentDefinitionBuilder::<Greeting>::named("greeting")
                .with_factory(|_| {
                    Ok(Greeting {
                        text: "hi".to_string(),
                    })
                })
                .build(),
        )
        .unwrap();

    container.get("greeting").unwrap();
    assert_eq!(*log.lock(), vec!["first", "second"]);
}
