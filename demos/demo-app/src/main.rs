//! # 示例应用程序
//!
//! 演示如何使用 Concord 容器注册组件、解析依赖和复用原型实例

use clap::Parser;
use concord_common::{
    ComponentDefinitionBuilder, ContainerResult, DependencySpec, ResolvedArguments, ScopeKind,
};
use concord_core::Container;
use std::sync::Arc;
use tracing::{info, Level};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "demo-app")]
#[command(about = "Concord 容器示例应用")]
struct Args {
    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 是否提前实例化全部非延迟单例
    #[arg(long)]
    eager: bool,
}

/// 数据库连接组件
struct Database {
    url: String,
}

impl Database {
    fn ping(&self) -> bool {
        !self.url.is_empty()
    }
}

/// 仓储组件，依赖数据库
struct OrderRepository {
    database: Arc<Database>,
}

impl OrderRepository {
    fn count_orders(&self) -> usize {
        if self.database.ping() {
            42
        } else {
            0
        }
    }
}

/// 原型作用域的报表构建器
struct ReportBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    info!("启动 Concord 示例应用");

    let container = build_container()?;
    if args.eager {
        let count = container.preinstantiate_eager_singletons();
        info!(count, "提前实例化完成");
    }

    demonstrate_resolution(&container)?;
    demonstrate_prototype_pooling(&container)?;
    demonstrate_statistics(&container);

    container.shutdown();
    info!("应用已关闭");
    Ok(())
}

/// 注册演示用的组件定义
fn build_container() -> ContainerResult<Container> {
    info!("注册组件定义");
    let container = Container::new();

    container.register(
        ComponentDefinitionBuilder::<Database>::named("database")
            .lazy(false)
            .with_constructor_arg(DependencySpec::literal::<String>(
                "url",
                Some(serde_json::json!("memory://orders")),
            ))
            .with_factory(|args: ResolvedArguments| {
                Ok(Database {
                    url: args.literal::<String>(0)?,
                })
            })
            .build(),
    )?;

    container.register(
        ComponentDefinitionBuilder::<OrderRepository>::named("orderRepository")
            .with_constructor_arg(DependencySpec::component::<Database>("database"))
            .with_factory(|args: ResolvedArguments| {
                Ok(OrderRepository {
                    database: args.instance::<Database>(0)?,
                })
            })
            .build(),
    )?;

    container.register(
        ComponentDefinitionBuilder::<ReportBuilder>::named("reportBuilder")
            .with_scope(ScopeKind::Prototype)
            .with_factory(|_| Ok(ReportBuilder))
            .build(),
    )?;

    Ok(container)
}

/// 演示按名称与按类型解析
fn demonstrate_resolution(container: &Container) -> ContainerResult<()> {
    let repository = container.get_typed::<OrderRepository>("orderRepository")?;
    info!(orders = repository.count_orders(), "仓储组件解析成功");

    let database = container.get_by_type::<Database>(None)?;
    info!(
        shared = Arc::ptr_eq(&repository.database, &database),
        "单例在依赖方之间共享"
    );
    Ok(())
}

/// 演示原型实例的池化复用
fn demonstrate_prototype_pooling(container: &Container) -> ContainerResult<()> {
    let report = container.get("reportBuilder")?;
    container.release_prototype("reportBuilder", report)?;
    // 第二次获取复用刚归还的空闲实例
    container.get("reportBuilder")?;
    Ok(())
}

/// 演示运行时统计快照
fn demonstrate_statistics(container: &Container) {
    let stats = container.statistics();
    info!(
        definitions = stats.definitions,
        metadata_hit_rate = stats.metadata_cache.hit_rate,
        "容器统计"
    );
    for (type_name, pool) in &stats.pools {
        info!(pool = %type_name, reused = pool.reused, hit_rate = pool.hit_rate, "池统计");
    }
}

fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
