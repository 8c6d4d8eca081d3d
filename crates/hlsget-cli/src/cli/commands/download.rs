//! `hlsget download` – run a download session and render its events.

use anyhow::{bail, Result};
use hlsget_core::config::HlsgetConfig;
use hlsget_core::events::SessionEvent;
use hlsget_core::session::{DownloadSession, SessionOptions};
use std::io::Write;
use std::path::PathBuf;

#[allow(clippy::too_many_arguments)]
pub fn run_download(
    cfg: &HlsgetConfig,
    url: String,
    segments_dir: PathBuf,
    output_dir: PathBuf,
    concurrency: Option<usize>,
    header_args: &[String],
    no_merge: bool,
    ffmpeg: Option<PathBuf>,
) -> Result<()> {
    // Config supplies default headers; explicit flags override by name.
    let mut headers = cfg.headers.clone();
    for arg in header_args {
        let (name, value) = parse_header(arg)?;
        headers.insert(name, value);
    }

    let options = SessionOptions {
        url,
        headers,
        segments_dir,
        output_dir,
        concurrency: concurrency.unwrap_or(cfg.concurrency),
        auto_merge: !no_merge && cfg.auto_merge,
        ffmpeg_path: ffmpeg.or_else(|| cfg.ffmpeg_path.clone()),
    };

    let (session, events) = DownloadSession::new(options);
    let printer = std::thread::spawn(move || {
        for event in events {
            match event {
                SessionEvent::Progress(pct) => {
                    print!("\r  {:>3}%", pct);
                    let _ = std::io::stdout().flush();
                    if pct == 100 {
                        println!();
                    }
                }
                SessionEvent::Log(line) => println!("{}", line),
                SessionEvent::Error(message) => eprintln!("{}", message),
                SessionEvent::Completed(output) => match output {
                    Some(path) => println!("done: {}", path.display()),
                    None => println!("done"),
                },
            }
        }
    });

    let result = session.run();
    drop(session);
    let _ = printer.join();
    result.map(|_| ())
}

/// Parses a "Name: value" header argument.
fn parse_header(arg: &str) -> Result<(String, String)> {
    match arg.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => bail!("invalid header {:?}, expected \"Name: value\"", arg),
    }
}
