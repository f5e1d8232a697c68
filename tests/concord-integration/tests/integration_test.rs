//! Centralized integration tests for the concord-core container
use concord_common::{
    ComponentDefinition, ComponentDefinitionBuilder, ContainerError, DependencySpec, Instance,
    ResolvedArguments, ScopeKind,
};
use concord_core::{Container, PoolConfig};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// 测试组件：无依赖的单例
struct Database {
    url: String,
}

/// 测试组件：构造器按类型依赖 Database
struct Repository {
    database: Arc<Database>,
}

fn database_definition() -> ComponentDefinition {
    ComponentDefinitionBuilder::<Database>::named("database")
        .with_factory(|_| {
            Ok(Database {
                url: "memory://primary".to_string(),
            })
        })
        .build()
}

fn repository_definition() -> ComponentDefinition {
    ComponentDefinitionBuilder::<Repository>::named("repository")
        .with_constructor_arg(DependencySpec::component::<Database>("database"))
        .with_factory(|args: ResolvedArguments| {
            Ok(Repository {
                database: args.instance::<Database>(0)?,
            })
        })
        .build()
}

#[test]
fn test_singleton_identity_across_threads() {
    let container = Arc::new(Container::new());
    container.register(database_definition()).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let container = Arc::clone(&container);
        handles.push(std::thread::spawn(move || {
            container.get_typed::<Database>("database").unwrap()
        }));
    }
    let instances: Vec<Arc<Database>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
    assert_eq!(instances[0].url, "memory://primary");
}

#[test]
fn test_concurrent_first_get_invokes_factory_once() {
    let container = Arc::new(Container::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let factory_calls = Arc::clone(&calls);
    container
        .register(
            ComponentDefinitionBuilder::<Database>::named("database")
                .with_factory(move |_| {
                    factory_calls.fetch_add(1, Ordering::SeqCst);
                    // 拉长创建窗口，让全部线程挤进慢路径
                    std::thread::sleep(Duration::from_millis(50));
                    Ok(Database {
                        url: "memory://raced".to_string(),
                    })
                })
                .build(),
        )
        .unwrap();

    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));
    let mut handles = Vec::new();
    for _ in 0..threads {
        let container = Arc::clone(&container);
        let barrier = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            container.get_typed::<Database>("database").unwrap()
        }));
    }
    let instances: Vec<Arc<Database>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
}

struct Node;

fn node_definition(name: &str, next: &str) -> ComponentDefinition {
    ComponentDefinitionBuilder::<Node>::named(name)
        .with_constructor_arg(DependencySpec::component::<Node>("next").qualified(next))
        .with_factory(|_| Ok(Node))
        .build()
}

#[test]
fn test_circular_dependency_reports_chain_without_deadlock() {
    let container = Container::new();
    container.register(node_definition("a", "b")).unwrap();
    container.register(node_definition("b", "c")).unwrap();
    container.register(node_definition("c", "a")).unwrap();

    let err = container.get("a").unwrap_err();
    match err {
        ContainerError::CircularDependency { chain } => {
            assert_eq!(chain, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    // 链路上的登记已全部回滚，后续请求依然能正常报错而不是死锁
    let err = container.get("a").unwrap_err();
    assert!(matches!(err, ContainerError::CircularDependency { .. }));
}

struct Tunable {
    retries: u32,
}

#[test]
fn test_literal_default_never_triggers_lookup() {
    let container = Container::new();
    container
        .register(
            ComponentDefinitionBuilder::<Tunable>::named("tunable")
                .with_constructor_arg(DependencySpec::literal::<u32>("retries", Some(json!(7))))
                .with_factory(|args: ResolvedArguments| {
                    Ok(Tunable {
                        retries: args.literal::<u32>(0)?,
                    })
                })
                .build(),
        )
        .unwrap();

    // 容器里没有任何 u32 组件，字面值参数照样直接取默认值
    let tunable = container.get_typed::<Tunable>("tunable").unwrap();
    assert_eq!(tunable.retries, 7);
}

#[test]
fn test_same_type_definitions_keep_their_own_argument_lists() {
    let container = Container::new();
    container
        .register(
            ComponentDefinitionBuilder::<Tunable>::named("plain")
                .with_factory(|_| Ok(Tunable { retries: 0 }))
                .build(),
        )
        .unwrap();
    container
        .register(
            ComponentDefinitionBuilder::<Tunable>::named("tuned")
                .with_constructor_arg(DependencySpec::literal::<u32>("retries", Some(json!(7))))
                .with_factory(|args: ResolvedArguments| {
                    Ok(Tunable {
                        retries: args.literal::<u32>(0)?,
                    })
                })
                .build(),
        )
        .unwrap();

    // 先解析无参定义，再解析同类型的带参定义，参数列表互不串扰
    assert_eq!(container.get_typed::<Tunable>("plain").unwrap().retries, 0);
    assert_eq!(container.get_typed::<Tunable>("tuned").unwrap().retries, 7);
}

struct Engine {
    label: &'static str,
}

fn engine_definition(name: &str, label: &'static str, primary: bool) -> ComponentDefinition {
    let builder = ComponentDefinitionBuilder::<Engine>::named(name)
        .with_factory(move |_| Ok(Engine { label }));
    if primary {
        builder.primary().build()
    } else {
        builder.build()
    }
}

#[test]
fn test_by_type_ambiguity_requires_primary_or_qualifier() {
    let container = Container::new();
    container
        .register(engine_definition("diesel", "diesel", false))
        .unwrap();
    container
        .register(engine_definition("petrol", "petrol", false))
        .unwrap();

    // 两个候选都不是 primary
    assert!(matches!(
        container.get_by_type::<Engine>(None),
        Err(ContainerError::AmbiguousComponent { .. })
    ));

    // 限定符直接选中
    let petrol = container.get_by_type::<Engine>(Some("petrol")).unwrap();
    assert_eq!(petrol.label, "petrol");

    // 恰好一个 primary 消除歧义
    container
        .register_or_replace(engine_definition("diesel", "diesel", true))
        .unwrap();
    let picked = container.get_by_type::<Engine>(None).unwrap();
    assert_eq!(picked.label, "diesel");

    // 两个 primary 仍然有歧义
    container
        .register_or_replace(engine_definition("petrol", "petrol", true))
        .unwrap();
    assert!(matches!(
        container.get_by_type::<Engine>(None),
        Err(ContainerError::AmbiguousComponent { .. })
    ));
}

struct Worker;

fn worker_definition(calls: Arc<AtomicUsize>) -> ComponentDefinition {
    ComponentDefinitionBuilder::<Worker>::named("worker")
        .with_scope(ScopeKind::Prototype)
        .with_factory(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Worker)
        })
        .build()
}

#[test]
fn test_prototype_acquisitions_are_distinct() {
    let container = Container::new();
    container
        .register(worker_definition(Arc::new(AtomicUsize::new(0))))
        .unwrap();

    let first = container.get("worker").unwrap();
    let second = container.get("worker").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn test_pool_reuses_released_prototypes() {
    let capacity = 3;
    let container = Container::builder()
        .with_pool_config(PoolConfig {
            max_size: capacity,
            ..PoolConfig::default()
        })
        .build();
    let calls = Arc::new(AtomicUsize::new(0));
    container.register(worker_definition(Arc::clone(&calls))).unwrap();

    let held: Vec<Instance> = (0..capacity)
        .map(|_| container.get("worker").unwrap())
        .collect();
    assert_eq!(calls.load(Ordering::SeqCst), capacity);

    for instance in held {
        container.release_prototype("worker", instance).unwrap();
    }
    // 空闲实例被复用，工厂不再被调用
    for _ in 0..capacity {
        container.get("worker").unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), capacity);
}

#[test]
fn test_warm_up_prefills_prototype_pool() {
    let container = Container::new();
    let calls = Arc::new(AtomicUsize::new(0));
    container.register(worker_definition(Arc::clone(&calls))).unwrap();

    assert_eq!(container.warm_up_prototypes("worker", 2).unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // 预热后的获取全部命中空闲实例
    container.get("worker").unwrap();
    container.get("worker").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

struct Widget {
    dep: Option<Arc<Widget>>,
}

#[test]
fn test_warm_up_completes_with_same_pool_dependency() {
    let container = Container::new();
    container
        .register(
            ComponentDefinitionBuilder::<Widget>::named("widgetLeaf")
                .with_scope(ScopeKind::Prototype)
                .with_factory(|_| Ok(Widget { dep: None }))
                .build(),
        )
        .unwrap();
    container
        .register(
            ComponentDefinitionBuilder::<Widget>::named("widgetRoot")
                .with_scope(ScopeKind::Prototype)
                .with_constructor_arg(
                    DependencySpec::component::<Widget>("dep").qualified("widgetLeaf"),
                )
                .with_factory(|args: ResolvedArguments| {
                    Ok(Widget {
                        dep: Some(args.instance::<Widget>(0)?),
                    })
                })
                .build(),
        )
        .unwrap();

    // 创建 widgetRoot 会在预热过程中重新进入同一个类型池去解析 widgetLeaf
    assert_eq!(container.warm_up_prototypes("widgetRoot", 1).unwrap(), 1);
    let stats = container.statistics();
    let pool = stats.pools.values().next().unwrap();
    assert_eq!(pool.idle, 1);
    assert_eq!(pool.created, 2);

    // 预热产出的实例带着已注入的依赖
    let root = container.get_typed::<Widget>("widgetRoot").unwrap();
    assert!(root.dep.is_some());
}

#[test]
fn test_replacing_prototype_definition_flushes_pooled_instances() {
    let container = Container::new();
    container
        .register(
            ComponentDefinitionBuilder::<Tunable>::named("report")
                .with_scope(ScopeKind::Prototype)
                .with_factory(|_| Ok(Tunable { retries: 1 }))
                .build(),
        )
        .unwrap();

    let old = container.get("report").unwrap();
    container.release_prototype("report", old).unwrap();

    // 替换定义后，旧工厂产出的空闲实例不得再被复用
    container
        .register_or_replace(
            ComponentDefinitionBuilder::<Tunable>::named("report")
                .with_scope(ScopeKind::Prototype)
                .with_factory(|_| Ok(Tunable { retries: 2 }))
                .build(),
        )
        .unwrap();

    let fresh = container.get_typed::<Tunable>("report").unwrap();
    assert_eq!(fresh.retries, 2);
}

#[test]
fn test_contender_receives_instance_published_by_lock_holder() {
    let container = Arc::new(Container::new());
    let entered = Arc::new(AtomicBool::new(false));
    let entered_in_factory = Arc::clone(&entered);
    container
        .register(
            ComponentDefinitionBuilder::<Database>::named("steady")
                .with_factory(move |_| {
                    entered_in_factory.store(true, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(150));
                    Ok(Database {
                        url: "memory://steady".to_string(),
                    })
                })
                .build(),
        )
        .unwrap();

    let holder = {
        let container = Arc::clone(&container);
        std::thread::spawn(move || container.get_typed::<Database>("steady").unwrap())
    };
    while !entered.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }

    // 竞争线程在有界等待内拿到持锁线程发布的同一实例
    let waited = container.get_typed::<Database>("steady").unwrap();
    let built = holder.join().unwrap();
    assert!(Arc::ptr_eq(&waited, &built));
}

#[test]
fn test_repository_shares_database_singleton() {
    let container = Container::new();
    container.register(database_definition()).unwrap();
    container.register(repository_definition()).unwrap();

    let repository = container.get_typed::<Repository>("repository").unwrap();
    let database = container.get_typed::<Database>("database").unwrap();
    assert!(Arc::ptr_eq(&repository.database, &database));
}

#[test]
fn test_bounded_wait_times_out_on_slow_creation() {
    let container = Arc::new(
        Container::builder()
            .with_creation_wait(Duration::from_millis(100))
            .build(),
    );
    let entered = Arc::new(AtomicBool::new(false));
    let entered_in_factory = Arc::clone(&entered);
    container
        .register(
            ComponentDefinitionBuilder::<Database>::named("slow")
                .with_factory(move |_| {
                    entered_in_factory.store(true, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(600));
                    Ok(Database {
                        url: "memory://slow".to_string(),
                    })
                })
                .build(),
        )
        .unwrap();

    let holder = {
        let container = Arc::clone(&container);
        std::thread::spawn(move || container.get("slow"))
    };
    while !entered.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }

    let err = container.get("slow").unwrap_err();
    match err {
        ContainerError::ComponentCreation { name, source } => {
            assert_eq!(name, "slow");
            assert!(source.to_string().contains("超时"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // 持锁线程自身的创建照常成功
    assert!(holder.join().unwrap().is_ok());
}

#[test]
fn test_end_request_flushes_request_scope_only() {
    let container = Container::new();
    container.register(database_definition()).unwrap();
    container
        .register(
            ComponentDefinitionBuilder::<Worker>::named("session")
                .with_scope(ScopeKind::Request)
                .with_factory(|_| Ok(Worker))
                .build(),
        )
        .unwrap();

    let singleton_before = container.get("database").unwrap();
    let first = container.get("session").unwrap();
    let again = container.get("session").unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    assert_eq!(container.end_request().unwrap(), 1);
    let after = container.get("session").unwrap();
    assert!(!Arc::ptr_eq(&first, &after));

    // 单例不受请求边界影响
    let singleton_after = container.get("database").unwrap();
    assert!(Arc::ptr_eq(&singleton_before, &singleton_after));
}

#[test]
fn test_unknown_component_suggests_similar_name() {
    let container = Container::new();
    container.register(database_definition()).unwrap();

    let err = container.get("databse").unwrap_err();
    match err {
        ContainerError::UnknownComponent { name, suggestions } => {
            assert_eq!(name, "databse");
            assert_eq!(suggestions, vec!["database".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_duplicate_registration_rejected_by_default() {
    let container = Container::new();
    container.register(database_definition()).unwrap();
    assert!(matches!(
        container.register(database_definition()),
        Err(ContainerError::DuplicateComponent { .. })
    ));
    // 显式替换是允许的
    assert!(container
        .register_or_replace(database_definition())
        .unwrap()
        .is_some());
}

#[test]
fn test_eager_preinstantiation_builds_non_lazy_singletons() {
    let container = Container::new();
    let built = Arc::new(AtomicUsize::new(0));
    for name in ["first", "second"] {
        let built = Arc::clone(&built);
        container
            .register(
                ComponentDefinitionBuilder::<Worker>::named(name)
                    .lazy(false)
                    .with_factory(move |_| {
                        built.fetch_add(1, Ordering::SeqCst);
                        Ok(Worker)
                    })
                    .build(),
            )
            .unwrap();
    }
    let lazy_built = Arc::new(AtomicUsize::new(0));
    {
        let lazy_built = Arc::clone(&lazy_built);
        container
            .register(
                ComponentDefinitionBuilder::<Worker>::named("third")
                    .with_factory(move |_| {
                        lazy_built.fetch_add(1, Ordering::SeqCst);
                        Ok(Worker)
                    })
                    .build(),
            )
            .unwrap();
    }

    assert_eq!(container.preinstantiate_eager_singletons(), 2);
    assert_eq!(built.load(Ordering::SeqCst), 2);
    assert_eq!(lazy_built.load(Ordering::SeqCst), 0);
}

#[test]
fn test_validate_reports_missing_required_dependency() {
    let container = Container::new();
    container.register(repository_definition()).unwrap();

    let problems = container.validate();
    assert_eq!(problems.len(), 1);
    assert!(matches!(
        &problems[0],
        ContainerError::DependencyResolution { requester, dependency, .. }
            if requester == "repository" && dependency == "database"
    ));

    container.register(database_definition()).unwrap();
    assert!(container.validate().is_empty());
}

#[test]
fn test_shutdown_runs_destroy_hooks_best_effort() {
    let container = Container::new();
    let destroyed = Arc::new(AtomicBool::new(false));
    container
        .register(
            ComponentDefinitionBuilder::<Worker>::named("broken")
                .with_factory(|_| Ok(Worker))
                .with_destroy("stop", |_: &Worker| {
                    Err(ContainerError::creation_message("broken", "销毁失败"))
                })
                .build(),
        )
        .unwrap();
    {
        let destroyed = Arc::clone(&destroyed);
        container
            .register(
                ComponentDefinitionBuilder::<Worker>::named("graceful")
                    .with_factory(|_| Ok(Worker))
                    .with_destroy("stop", move |_: &Worker| {
                        destroyed.store(true, Ordering::SeqCst);
                        Ok(())
                    })
                    .build(),
            )
            .unwrap();
    }
    container.get("broken").unwrap();
    container.get("graceful").unwrap();

    // 一个销毁方法失败不影响其余的执行
    container.shutdown();
    assert!(destroyed.load(Ordering::SeqCst));
}

#[test]
fn test_statistics_aggregate_all_subsystems() {
    let container = Container::new();
    container.register(database_definition()).unwrap();
    container
        .register(worker_definition(Arc::new(AtomicUsize::new(0))))
        .unwrap();

    container.get("database").unwrap();
    container.get("worker").unwrap();

    let stats = container.statistics();
    assert_eq!(stats.definitions, 2);
    assert!(stats.metadata_cache.misses >= 2);
    assert!(!stats.pools.is_empty());
    let singleton = stats
        .scopes
        .iter()
        .find(|s| s.kind == ScopeKind::Singleton)
        .unwrap();
    assert_eq!(singleton.instance_count, 1);
}
