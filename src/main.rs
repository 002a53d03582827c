use lull::app::AppStartupOptions;
use lull::model::{LoopMode, Settings};
use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    sources: Vec<PathBuf>,
    loop_mode: Option<LoopMode>,
    shuffle: bool,
    volume: Option<f32>,
    null_audio: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = parse_args(std::env::args().skip(1).collect())?;

    let settings = if args.loop_mode.is_some() || args.shuffle || args.volume.is_some() {
        let saved = lull::config::load_state()?.settings;
        Some(Settings {
            volume: args.volume.unwrap_or(saved.volume),
            loop_mode: args.loop_mode.unwrap_or(saved.loop_mode),
            shuffle: args.shuffle || saved.shuffle,
            ..saved
        })
    } else {
        None
    };

    lull::app::run_with_startup(AppStartupOptions {
        sources: args.sources,
        settings,
        null_audio: args.null_audio,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--loop" => {
                index += 1;
                out.loop_mode = Some(match args.get(index).map(String::as_str) {
                    Some("none" | "off") => LoopMode::None,
                    Some("one") => LoopMode::One,
                    Some("all") => LoopMode::All,
                    Some(other) => anyhow::bail!("unknown loop mode {other}"),
                    None => anyhow::bail!("--loop requires none|one|all"),
                });
            }
            "--volume" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--volume requires a value between 0 and 1");
                };
                let volume: f32 = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid volume {value}"))?;
                out.volume = Some(volume.clamp(0.0, 1.0));
            }
            "--shuffle" => out.shuffle = true,
            "--null-audio" => out.null_audio = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            flag if flag.starts_with("--") => anyhow::bail!("unknown argument {flag}"),
            path => out.sources.push(PathBuf::from(path)),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("lull [options] [file|folder ...]");
    println!("  --loop none|one|all   Loop mode");
    println!("  --shuffle             Start shuffled");
    println!("  --volume 0..1         Start volume");
    println!("  --null-audio          Run without an output device");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_sources() {
        let parsed = parse_args(args(&["--loop", "all", "--shuffle", "--volume", "2", "calm/"]))
            .expect("parse");
        assert_eq!(parsed.loop_mode, Some(LoopMode::All));
        assert!(parsed.shuffle);
        assert_eq!(parsed.volume, Some(1.0));
        assert_eq!(parsed.sources, vec![PathBuf::from("calm/")]);
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["--loop"])).is_err());
        assert!(parse_args(args(&["--loop", "twice"])).is_err());
    }
}
