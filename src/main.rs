//! x11core - headless X11 server
//!
//! Runs the protocol engine with in-memory host collaborators.

use std::env;
use std::process;
use std::sync::Arc;
use std::thread;

use x11core::backend::Host;
use x11core::connection::{unix_socket_path, Listener};
use x11core::security::AuthPolicy;
use x11core::server::{serve, ScreenConfig, Server, ServerConfig};
use x11core::VERSION;

fn print_usage() {
    println!("x11core v{}", VERSION);
    println!("A headless X11 server");
    println!();
    println!("Usage: x11core [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -display <n>          Display number (default: 1)");
    println!("  -tcp / -notcp         Listen on TCP port 6000 + display (default: on)");
    println!("  -unix / -nounix       Listen on /tmp/.X11-unix/X<n> (default: on for Unix)");
    println!("  -geometry <W>x<H>     Screen size in pixels (default: 1280x800)");
    println!("  -auth <mode>          none, any, or cookie:<hex>");
    println!("  -strict               Close connections that send unknown opcodes");
    println!("  -h, --help            Show this help message");
    println!();
    println!("Examples:");
    println!("  x11core -display 2 -geometry 1920x1080");
    println!("  x11core -nounix -auth cookie:0123456789abcdef0123456789abcdef");
    println!();
}

fn parse_geometry(value: &str) -> Result<ScreenConfig, String> {
    let (w, h) = value
        .split_once('x')
        .ok_or_else(|| format!("Invalid geometry: {}", value))?;
    let width: u16 = w.parse().map_err(|_| format!("Invalid width: {}", w))?;
    let height: u16 = h.parse().map_err(|_| format!("Invalid height: {}", h))?;
    if width == 0 || height == 0 {
        return Err(format!("Invalid geometry: {}", value));
    }
    Ok(ScreenConfig::with_size(width, height))
}

fn parse_auth(value: &str) -> Result<AuthPolicy, String> {
    match value {
        "none" => Ok(AuthPolicy::default()),
        "any" => Ok(AuthPolicy::permissive()),
        _ => {
            let hex = value
                .strip_prefix("cookie:")
                .ok_or_else(|| format!("Invalid auth mode: {}", value))?;
            if hex.is_empty() || hex.len() % 2 != 0 {
                return Err(format!("Invalid cookie: {}", hex));
            }
            let cookie = (0..hex.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
                .collect::<Result<Vec<u8>, _>>()
                .map_err(|_| format!("Invalid cookie: {}", hex))?;
            Ok(AuthPolicy::with_cookie(cookie))
        }
    }
}

fn parse_args() -> Result<Option<ServerConfig>, String> {
    let mut config = ServerConfig::default();
    let args: Vec<String> = env::args().skip(1).collect();

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("Missing value for {}", flag))
        };
        match flag {
            "-h" | "--help" => return Ok(None),
            "-display" => {
                let v = value()?;
                config.display = v
                    .trim_start_matches(':')
                    .parse()
                    .map_err(|_| format!("Invalid display number: {}", v))?;
            }
            "-geometry" => config.screen = parse_geometry(&value()?)?,
            "-auth" => config.auth = parse_auth(&value()?)?,
            "-tcp" => config.listen_tcp = true,
            "-notcp" => config.listen_tcp = false,
            "-unix" => config.listen_unix = true,
            "-nounix" => config.listen_unix = false,
            "-strict" => config.strict_opcodes = true,
            arg => return Err(format!("Unknown option: {}", arg)),
        }
        i += 1;
    }

    Ok(Some(config))
}

fn open_listeners(config: &ServerConfig) -> Vec<Listener> {
    let mut listeners = Vec::new();

    if config.listen_tcp {
        match Listener::tcp(config.tcp_port()) {
            Ok(listener) => listeners.push(listener),
            Err(e) => log::error!("Failed to listen on TCP port {}: {}", config.tcp_port(), e),
        }
    }

    #[cfg(unix)]
    if config.listen_unix {
        let path = unix_socket_path(config.display);
        match Listener::unix(&path) {
            Ok(listener) => {
                log::info!("Unix socket: {}", path);
                listeners.push(listener);
            }
            Err(e) => log::error!("Failed to listen on {}: {}", path, e),
        }
    }
    #[cfg(not(unix))]
    if config.listen_unix {
        log::warn!("Unix sockets are not available on this platform");
    }

    listeners
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match parse_args() {
        Ok(Some(config)) => config,
        Ok(None) => {
            print_usage();
            return;
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    log::info!("x11core v{}", VERSION);
    log::info!("Display: :{}", config.display);
    log::info!(
        "Screen: {}x{} ({}x{} mm)",
        config.screen.width,
        config.screen.height,
        config.screen.width_mm,
        config.screen.height_mm
    );

    let listeners = open_listeners(&config);
    if listeners.is_empty() {
        eprintln!("Error: no listening sockets");
        process::exit(1);
    }

    let server = Arc::new(Server::new(config, Host::headless()));
    let handles: Vec<_> = listeners
        .into_iter()
        .map(|listener| {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                if let Err(e) = serve(listener, server) {
                    log::error!("Listener stopped: {}", e);
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            log::error!("Listener thread panicked");
        }
    }
}
