use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{Context, bail};
use junos_session::device::Device;
use junos_session::features::{Collector, alarm::AlarmCollector};
use junos_session::rpc::RpcClient;
use junos_session::session::{Mode, SshConnection};
use junos_session::transport::{ConnectionSecurityOptions, SecurityLevel};

fn print_usage() {
    eprintln!(
        "Usage: alarm_probe <host> <username> [--netconf] [--port N] [--level secure|balanced|legacy] [--filter REGEX] [--debug]"
    );
    eprintln!("The password is read from JUNOS_PASSWORD.");
}

struct Options {
    host: String,
    username: String,
    port: u16,
    mode: Mode,
    level: SecurityLevel,
    filter: Option<String>,
    debug: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    if args.len() < 3 {
        print_usage();
        process::exit(2);
    }

    let mut options = Options {
        host: args[1].clone(),
        username: args[2].clone(),
        port: junos_session::config::DEFAULT_PORT,
        mode: Mode::Shell,
        level: SecurityLevel::default(),
        filter: None,
        debug: false,
    };

    let mut rest = args.iter().skip(3);
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--netconf" => options.mode = Mode::Netconf,
            "--debug" => options.debug = true,
            "--port" => {
                let value = rest.next().context("--port needs a value")?;
                options.port = value.parse().context("invalid port")?;
            }
            "--level" => {
                options.level = match rest.next().map(String::as_str) {
                    Some("secure") => SecurityLevel::Secure,
                    Some("balanced") => SecurityLevel::Balanced,
                    Some("legacy") => SecurityLevel::LegacyCompatible,
                    other => bail!("unknown security level: {other:?}"),
                };
            }
            "--filter" => {
                options.filter = Some(rest.next().context("--filter needs a value")?.clone());
            }
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            unknown => {
                eprintln!("Unknown flag: {unknown}");
                print_usage();
                process::exit(2);
            }
        }
    }

    Ok(options)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args)?;
    let password = env::var("JUNOS_PASSWORD").context("JUNOS_PASSWORD is not set")?;

    let mut device = Device::with_password(&options.host, &options.username, &password);
    device.port = options.port;

    let security = ConnectionSecurityOptions::for_level(options.level);
    let conn = SshConnection::connect(device, &security, options.mode)
        .await
        .with_context(|| format!("connecting to {}", options.host))?;

    let mut client = RpcClient::new(Arc::new(conn));
    if options.debug {
        client = client.with_debug();
    }

    let collector = AlarmCollector::new(options.filter.as_deref())?;
    let result = collector.collect(&client, &options.host).await;
    client.connection().close().await;

    for metric in result? {
        let labels = metric
            .labels
            .iter()
            .map(|(name, value)| format!("{name}=\"{value}\""))
            .collect::<Vec<_>>()
            .join(",");
        println!("{}{{{}}} {}", metric.name, labels, metric.value);
    }

    Ok(())
}
