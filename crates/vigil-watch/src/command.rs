use vigil_process::ActionKind;

/// One line typed at the watch prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Action(ActionKind),
    Console(String),
    ClearLog,
    EditPort,
    CancelPort,
    SetPort(u16),
    Follow(bool),
    Reload,
    Refresh,
    Quit,
    Help,
}

pub const HELP: &str = "\
/start /stop /restart     lifecycle actions
/port                     hold the port field for editing
/port <n>                 change the port (1024-65535)
/cancel                   stop editing the port
/clear                    clear the remote log
/follow on|off            toggle log following
/reload                   fetch new log lines now
/refresh                  poll now
/quit                     exit
anything else is sent to the console";

/// Parses one input line. Blank input yields `None`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Some(Command::Console(line.trim_end_matches(['\r', '\n']).to_string())));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    let cmd = match (name, arg) {
        ("start", None) => Command::Action(ActionKind::Start),
        ("stop", None) => Command::Action(ActionKind::Stop),
        ("restart", None) => Command::Action(ActionKind::Restart),
        ("clear", None) => Command::ClearLog,
        ("port", None) => Command::EditPort,
        ("port", Some(n)) => Command::SetPort(
            n.parse::<u16>()
                .map_err(|_| format!("not a port number: {n}"))?,
        ),
        ("cancel", None) => Command::CancelPort,
        ("follow", Some("on")) => Command::Follow(true),
        ("follow", Some("off")) => Command::Follow(false),
        ("reload", None) => Command::Reload,
        ("refresh", None) => Command::Refresh,
        ("quit" | "exit", None) => Command::Quit,
        ("help", None) => Command::Help,
        _ => return Err(format!("unknown command: {trimmed} (try /help)")),
    };
    Ok(Some(cmd))
}
