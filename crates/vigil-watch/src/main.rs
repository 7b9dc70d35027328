use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use vigil_monitor::{
    ActionGateway, HttpMonitorApi, MonitorApi, MonitorConfig, PollSession, SessionEvent, events,
};
use vigil_process::{PermissionSet, TargetId};

mod command;
mod render;

use command::Command;

async fn dispatch(cmd: Command, session: &PollSession, gateway: &ActionGateway) {
    match cmd {
        Command::Action(kind) => {
            gateway.perform_action(kind).await;
        }
        Command::Console(line) => {
            gateway.send_console(&line).await;
        }
        Command::ClearLog => {
            gateway.clear_log().await;
        }
        Command::EditPort => {
            if let Err(e) = gateway.begin_port_edit().await {
                println!("port edit refused: {e}");
            }
        }
        Command::CancelPort => gateway.cancel_port_edit().await,
        Command::SetPort(port) => {
            gateway.commit_port_edit(port).await;
        }
        Command::Follow(on) => {
            session.set_follow_logs(on).await;
            let state = if session.follows_logs() { "on" } else { "off" };
            println!("log following {state}");
        }
        Command::Reload => {
            if !session.reload_logs().await {
                println!("log reload failed or not permitted");
            }
        }
        Command::Refresh => {
            session.refresh().await;
        }
        Command::Help => println!("{}", command::HELP),
        Command::Quit => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = MonitorConfig::from_env();
    let target = std::env::var("VIGIL_TARGET")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(TargetId::new)
        .context("VIGIL_TARGET (or the first argument) must name the target to watch")?;

    let http = HttpMonitorApi::new(&config.base_url, config.request_timeout)?;
    tracing::info!(base_url = %http.base_url(), target_id = %target, "vigil-watch connecting");
    let api: Arc<dyn MonitorApi> = Arc::new(http);

    let (tx, mut rx) = events::channel();
    let (session, gateway) =
        match PollSession::open(target.clone(), api.clone(), &config, tx.clone()).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "permissions unavailable; continuing read-only");
                let permissions = PermissionSet::read_only();
                let session = PollSession::new(target, api, permissions, &config, tx);
                let gateway = ActionGateway::new(&session, permissions);
                (session, gateway)
            }
        };
    tracing::info!(session = %session.id(), "session opened");

    let mut printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            for line in render::render(&event) {
                println!("{line}");
            }
            if matches!(event, SessionEvent::TargetGone { .. }) {
                break;
            }
        }
    });

    session.start().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut printer => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(cmd)) => dispatch(cmd, &session, &gateway).await,
                    Ok(None) => {}
                    Err(msg) => println!("{msg}"),
                }
            }
        }
    }

    session.stop();
    drop(gateway);
    drop(session);
    printer.abort();
    tracing::info!("vigil-watch exiting");
    Ok(())
}
