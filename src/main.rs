use anyhow::{Context, bail};
use env_logger::Builder;
use log::{LevelFilter, info};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use adhoc_range_simulator::handshake::{Connection, Listener};
use adhoc_range_simulator::scene::load_session_file;
use adhoc_range_simulator::session::{parse_deltas, parse_device};
use adhoc_range_simulator::{NetworkConfig, PositionUpdate, Session};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "usage: adhoc-range-simulator [--config <path>] <command>

commands:
  evaluate <id> <x> <y> <z> <range> <peer-id> [<dx> <dy> <dz>]
  scene <file.json>
  listen <id>
  connect <id>";

fn main() -> anyhow::Result<()> {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("adhoc_range_simulator"), LevelFilter::Debug)
        .parse_default_env()
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("adhoc-range-simulator {}", VERSION);
        return Ok(());
    }

    let config_path = take_option(&mut args, "--config")?;
    let mut config = match config_path {
        Some(path) => NetworkConfig::load(&path)?,
        None => NetworkConfig::default(),
    };
    config.apply_env()?;

    let Some((command, rest)) = args.split_first() else {
        bail!("missing command\n{}", USAGE);
    };
    match (command.as_str(), rest) {
        ("evaluate", [id, x, y, z, range, peer_id]) => evaluate(id, [x, y, z, range], peer_id, None),
        ("evaluate", [id, x, y, z, range, peer_id, dx, dy, dz]) => evaluate(id, [x, y, z, range], peer_id, Some([dx, dy, dz])),
        ("scene", [path]) => run_scene(path),
        ("listen", [id]) => listen(&config, id),
        ("connect", [id]) => connect(&config, id),
        _ => bail!("unrecognized arguments\n{}", USAGE),
    }
}

/// Remove `--flag <value>` from `args` and return the value.
fn take_option(args: &mut Vec<String>, flag: &str) -> anyhow::Result<Option<PathBuf>> {
    let Some(index) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if index + 1 >= args.len() {
        bail!("{} needs a value", flag);
    }
    let value = args.remove(index + 1);
    args.remove(index);
    Ok(Some(PathBuf::from(value)))
}

fn evaluate(id: &str, fields: [&String; 4], peer_id: &str, deltas: Option<[&String; 3]>) -> anyhow::Result<()> {
    let [x, y, z, range] = fields;
    let local = parse_device(id, x, y, z, range)?;
    let mut session = Session::start(local, peer_id)?;
    let telemetry = watch_positions(&mut session);

    println!("{}", session.status());
    if let Some([dx, dy, dz]) = deltas {
        let (dx, dy, dz) = parse_deltas(dx, dy, dz)?;
        println!("{}", session.move_local(dx, dy, dz));
    }
    finish_telemetry(session, telemetry);
    Ok(())
}

fn run_scene(path: &str) -> anyhow::Result<()> {
    let file = load_session_file(path)?;
    let mut session = file.build_session().with_context(|| format!("Invalid session file {}", path))?;
    let telemetry = watch_positions(&mut session);

    println!("{}", session.status());
    for mv in &file.moves {
        println!("{}", session.move_local(mv.dx, mv.dy, mv.dz));
    }
    finish_telemetry(session, telemetry);
    Ok(())
}

/// Log position telemetry from a side thread. The thread returns the number of updates it logged once the session is
/// dropped.
fn watch_positions(session: &mut Session) -> Option<JoinHandle<usize>> {
    let (tx, rx) = mpsc::channel::<PositionUpdate>();
    session.attach_observer(tx);
    let spawned = thread::Builder::new().name("position-telemetry".to_string()).spawn(move || {
        let mut logged = 0;
        for update in rx {
            log::debug!("telemetry {} at {} ({})", update.device_id, update.position, update.timestamp.to_rfc3339());
            logged += 1;
        }
        logged
    });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("Position telemetry disabled: {}", e);
            None
        }
    }
}

/// Close the telemetry channel and wait until every pending update is logged.
fn finish_telemetry(session: Session, telemetry: Option<JoinHandle<usize>>) -> usize {
    drop(session);
    match telemetry.map(JoinHandle::join) {
        Some(Ok(logged)) => logged,
        Some(Err(_)) => {
            log::warn!("Position telemetry thread panicked");
            0
        }
        None => 0,
    }
}

fn listen(config: &NetworkConfig, id: &str) -> anyhow::Result<()> {
    let listener = Listener::listen(&config.listen_address, config.listen_port)?;
    let mut handle = listener.spawn(id)?;
    info!("Waiting on {} (Ctrl+C to abort)", handle.local_addr());

    let report = handle.outcome()?;
    println!("Announced {} to {}", report.device_id, report.peer_addr);
    handle.join();
    Ok(())
}

fn connect(config: &NetworkConfig, id: &str) -> anyhow::Result<()> {
    let connection = Connection::connect(&config.peer_address, config.peer_port)?;
    info!("Device {} connected to server.", id);
    let announcement = connection.receive()?;
    println!("{}", announcement.message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adhoc_range_simulator::Device;

    #[test]
    fn telemetry_drains_every_update_before_exit() {
        let local = Device::create("A", 0.0, 0.0, 0.0, 5.0).unwrap();
        let mut session = Session::start(local, "B").unwrap();
        let telemetry = watch_positions(&mut session);
        assert!(telemetry.is_some());

        for _ in 0..50 {
            session.move_local(1.0, 0.0, 0.0);
        }
        assert_eq!(finish_telemetry(session, telemetry), 50);
    }

    #[test]
    fn take_option_removes_flag_and_value() {
        let mut args: Vec<String> = ["--config", "net.toml", "listen", "A"].iter().map(|s| s.to_string()).collect();
        assert_eq!(take_option(&mut args, "--config").unwrap(), Some(PathBuf::from("net.toml")));
        assert_eq!(args, ["listen", "A"]);
        assert!(take_option(&mut vec!["--config".to_string()], "--config").is_err());
    }
}
