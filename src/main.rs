use std::net::TcpListener;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use fsgraph::config::{Cli, ServerConfig};
use fsgraph::fs::FileSystem;
use fsgraph::{net, service, watcher};

/// Write-end of the self-pipe used for signal notification.
static SIGNAL_PIPE: AtomicI32 = AtomicI32::new(-1);

extern "C" fn signal_handler(_sig: libc::c_int) {
    let fd = SIGNAL_PIPE.load(Ordering::Relaxed);
    if fd >= 0 {
        unsafe {
            libc::write(fd, [0u8].as_ptr() as *const libc::c_void, 1);
        }
    }
}

enum ShutdownReason {
    /// SIGINT or SIGTERM.
    Signal,
    /// The service loop ended on its own.
    ServiceExited,
}

/// Block until a termination signal arrives or the service thread finishes.
fn wait_for_shutdown(service_thread: &JoinHandle<()>) -> ShutdownReason {
    let mut pipe_fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(pipe_fds.as_mut_ptr()) } != 0 {
        error!(
            "failed to create signal pipe: {}",
            std::io::Error::last_os_error()
        );
        // Without a pipe we can only wait for the service to stop.
        while !service_thread.is_finished() {
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        return ShutdownReason::ServiceExited;
    }

    SIGNAL_PIPE.store(pipe_fds[1], Ordering::Relaxed);

    unsafe {
        use nix::sys::signal::{signal, SigHandler, Signal};
        signal(Signal::SIGINT, SigHandler::Handler(signal_handler)).ok();
        signal(Signal::SIGTERM, SigHandler::Handler(signal_handler)).ok();
    }

    // Poll with a timeout so an exited service loop is noticed too.
    let reason = loop {
        let mut pfd = libc::pollfd {
            fd: pipe_fds[0],
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, 200) };

        if ret > 0 {
            let mut buf = [0u8; 1];
            unsafe {
                libc::read(pipe_fds[0], buf.as_mut_ptr() as *mut libc::c_void, 1);
            }
            break ShutdownReason::Signal;
        }

        if service_thread.is_finished() {
            break ShutdownReason::ServiceExited;
        }
    };

    SIGNAL_PIPE.store(-1, Ordering::Relaxed);
    unsafe {
        libc::close(pipe_fds[0]);
        libc::close(pipe_fds[1]);
    }

    reason
}

fn main() {
    let cli = Cli::parse();
    let config = ServerConfig::from(cli).validate().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    // Set up logging
    let log_dir = config
        .log_file
        .parent()
        .unwrap_or_else(|| std::path::Path::new("/tmp"));
    let log_name = config
        .log_file
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("fsgraph.log"));
    let file_appender = tracing_appender::rolling::never(log_dir, log_name);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false),
        )
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error: failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    info!(
        "fsgraph starting: root={}, listen={}",
        config.root.display(),
        config.listen
    );

    let fs = match FileSystem::new(config.clone()) {
        Ok(fs) => Arc::new(fs),
        Err(e) => {
            error!("Failed to project {}: {}", config.root.display(), e);
            std::process::exit(1);
        }
    };

    let (handle, service_thread) = match service::spawn(Arc::clone(&fs), config.event_queue) {
        Ok(spawned) => spawned,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    // Kept alive until shutdown; dropping it stops the watch.
    let _watcher = if config.watch {
        match watcher::start_watcher(&fs.root_dir, handle.clone()) {
            Ok(w) => Some(w),
            Err(e) => {
                error!("{}; external changes will not be reflected", e);
                None
            }
        }
    } else {
        None
    };

    let listener = match TcpListener::bind(config.listen) {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to listen on {}: {}", config.listen, e);
            std::process::exit(1);
        }
    };
    let net_handle = handle.clone();
    let spawned = std::thread::Builder::new()
        .name("fsgraph-net".to_string())
        .spawn(move || {
            if let Err(e) = net::serve(listener, net_handle) {
                error!("listener failed: {}", e);
            }
        });
    if let Err(e) = spawned {
        error!("Failed to start listener thread: {}", e);
        std::process::exit(1);
    }

    match wait_for_shutdown(&service_thread) {
        ShutdownReason::Signal => {
            let open = fs.handles.list_open();
            if !open.is_empty() {
                eprintln!("fsgraph: closing {} open file(s):", open.len());
                let display_cap = 10;
                for info in open.iter().take(display_cap) {
                    eprintln!("  {}  (handle {}, {:?})", info.path, info.handle, info.mode);
                }
                if open.len() > display_cap {
                    eprintln!("  and {} more...", open.len() - display_cap);
                }
            }
            handle.shutdown();
            if service_thread.join().is_err() {
                error!("service thread panicked");
            }
        }
        ShutdownReason::ServiceExited => {
            error!("service loop exited unexpectedly");
        }
    }

    eprintln!("fsgraph: stopped serving {}", fs.root_dir.display());
}
