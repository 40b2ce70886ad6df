use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use tracing::{error, info, warn};

use coordinator::app::{Application, Operation};
use coordinator::common::{
    init_logging, init_metrics, load_config, wait_for_shutdown_signal, StartupConfig,
};
use coordinator::shutdown::ShutdownManager;
use coordinator_core::models::SiteDescriptor;
use coordinator_jobs::{plugins::PluginTarget, sites::SiteTarget};

fn plugin_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("plugin")
                .short('p')
                .long("plugin")
                .value_name("UID")
                .help("插件uid")
                .required(true),
        )
        .arg(
            Arg::new("site")
                .short('s')
                .long("site")
                .value_name("UID")
                .help("站点uid，默认全局站点"),
        )
}

fn site_args(command: Command) -> Command {
    command.arg(
        Arg::new("site")
            .short('s')
            .long("site")
            .value_name("UID")
            .help("站点uid")
            .required(true),
    )
}

fn cli() -> Command {
    Command::new("coordinator")
        .version("1.0.0")
        .about("集群作业协调系统")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("process-id")
                .long("process-id")
                .value_name("ID")
                .help("覆盖配置中的进程ID")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(Command::new("serve").about("作为集群成员运行，直到收到关闭信号"))
        .subcommand(plugin_args(Command::new("install").about("在集群中安装插件")))
        .subcommand(plugin_args(Command::new("uninstall").about("在集群中卸载插件")))
        .subcommand(plugin_args(
            Command::new("initialize").about("在集群的每个进程上启动插件"),
        ))
        .subcommand(plugin_args(
            Command::new("available").about("检查每个进程都能加载插件的依赖"),
        ))
        .subcommand(plugin_args(
            Command::new("dependencies").about("在每个进程上安装插件缺失的依赖"),
        ))
        .subcommand(site_args(Command::new("site-activate").about("激活站点")))
        .subcommand(site_args(Command::new("site-deactivate").about("停用站点")))
        .subcommand(
            Command::new("site-create-edit")
                .about("创建或编辑站点")
                .arg(
                    Arg::new("site")
                        .short('s')
                        .long("site")
                        .value_name("UID")
                        .help("站点uid，省略时新建站点"),
                )
                .arg(
                    Arg::new("display-name")
                        .long("display-name")
                        .value_name("NAME")
                        .required(true),
                )
                .arg(
                    Arg::new("hostname")
                        .long("hostname")
                        .value_name("HOST")
                        .required(true),
                ),
        )
}

fn parse_operation(name: &str, args: &ArgMatches) -> Result<Operation> {
    let plugin_target = || -> Result<PluginTarget> {
        let uid = args
            .get_one::<String>("plugin")
            .context("缺少 --plugin 参数")?;
        let site = args.get_one::<String>("site").map(String::as_str);
        Ok(PluginTarget::new(uid, site)?)
    };
    let site_target = || -> Result<SiteTarget> {
        let uid = args.get_one::<String>("site").context("缺少 --site 参数")?;
        Ok(SiteTarget::new(uid)?)
    };

    Ok(match name {
        "install" => Operation::Install(plugin_target()?),
        "uninstall" => Operation::Uninstall(plugin_target()?),
        "initialize" => Operation::Initialize(plugin_target()?),
        "available" => Operation::Available(plugin_target()?),
        "dependencies" => Operation::Dependencies(plugin_target()?),
        "site-activate" => Operation::SiteActivate(site_target()?),
        "site-deactivate" => Operation::SiteDeactivate(site_target()?),
        "site-create-edit" => {
            let value = |id: &str| args.get_one::<String>(id).map(String::as_str).unwrap_or("");
            Operation::SiteCreateEdit(SiteDescriptor::new(
                value("site"),
                value("display-name"),
                value("hostname"),
            ))
        }
        other => return Err(anyhow::anyhow!("不支持的子命令: {other}")),
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();

    let startup = StartupConfig {
        config_path: matches.get_one::<String>("config").cloned(),
        log_level: matches.get_one::<String>("log-level").cloned(),
        log_format: matches.get_one::<String>("log-format").cloned(),
        process_id: matches.get_one::<String>("process-id").cloned(),
    };
    let config = load_config(&startup)?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;
    init_metrics(&config.observability)?;

    let Some((subcommand, args)) = matches.subcommand() else {
        return Err(anyhow::anyhow!("缺少子命令"));
    };

    info!("启动集群作业协调系统: {} ({})", config.node.process_id, subcommand);
    let app = Arc::new(Application::new(config).await?);

    if subcommand == "serve" {
        serve(app).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let operation = parse_operation(subcommand, args)?;
    app.start().await?;
    let outcome = app.execute(operation).await;
    app.stop().await;

    let outcome = outcome?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn serve(app: Arc<Application>) -> Result<()> {
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("进程运行失败: {e:#}");
            }
        })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("进程已优雅关闭"),
        Ok(Err(e)) => error!("进程关闭时发生错误: {e}"),
        Err(_) => warn!("进程关闭超时，强制退出"),
    }
    Ok(())
}
