use std::ffi::OsString;

use glam::UVec2;
use lumen::wgpu::{Backend, PresentMode};
use lumen_framework::LaunchOptions;
use pico_args::Arguments;

pub const HELP: &str = "\
lumen-examples

A gallery of small wgpu examples.

usage: lumen-examples --options <example_name>

Meta:
  -h --help          This menu.
  --list             List every example and exit.
  --random           Run a randomly chosen example.

Rendering:
  -b --backend       Choose backend to run on ('vk', 'dx12', 'metal', 'gl').
  -d --device        Choose device to run on (case insensitive device substring).
  -v --vsync         Choose vsync mode ('immediate' [no-vsync], 'fifo' [vsync], 'fifo_relaxed' [adaptive vsync], 'mailbox' [fast vsync])

Windowing:
  --width <pixels>   Initial window width. Defaults to the example's own size.
  --height <pixels>  Initial window height. Defaults to the example's own size.

Controls:
  Space              Pause or resume animation.
  Escape             Quit.
  m                  Cycle render modes (reversed_z).
  a                  Attach particles to the cursor (compute_particles).
  + -                Change the LOD bias (textured_quad).
";

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("{0}")]
    Parse(#[from] pico_args::Error),
    #[error("Unknown arguments: {0}")]
    Unknown(String),
    #[error("--width and --height must be given together")]
    HalfSize,
}

/// Everything parsed from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cli {
    pub help: bool,
    pub list: bool,
    pub random: bool,
    pub example: Option<String>,
    pub options: LaunchOptions,
}

fn extract_backend(value: &str) -> Result<Backend, &'static str> {
    Ok(match value.to_lowercase().as_str() {
        "vulkan" | "vk" => Backend::Vulkan,
        "dx12" | "12" => Backend::Dx12,
        "metal" | "mtl" => Backend::Metal,
        "opengl" | "gl" => Backend::Gl,
        _ => return Err("unknown backend"),
    })
}

fn extract_vsync(value: &str) -> Result<PresentMode, &'static str> {
    Ok(match value.to_lowercase().as_str() {
        "immediate" => PresentMode::Immediate,
        "fifo" => PresentMode::Fifo,
        "fifo_relaxed" => PresentMode::FifoRelaxed,
        "mailbox" => PresentMode::Mailbox,
        _ => return Err("invalid vsync mode"),
    })
}

impl Cli {
    pub fn from_env() -> Result<Self, ArgsError> {
        Self::parse(Arguments::from_env())
    }

    pub fn from_vec(args: Vec<OsString>) -> Result<Self, ArgsError> {
        Self::parse(Arguments::from_vec(args))
    }

    fn parse(mut args: Arguments) -> Result<Self, ArgsError> {
        let mut cli = Cli {
            help: args.contains(["-h", "--help"]),
            list: args.contains("--list"),
            random: args.contains("--random"),
            ..Cli::default()
        };

        // Rendering
        cli.options.backend = args.opt_value_from_fn(["-b", "--backend"], extract_backend)?;
        cli.options.device = args.opt_value_from_str(["-d", "--device"])?.map(|s: String| s.to_lowercase());
        if let Some(present_mode) = args.opt_value_from_fn(["-v", "--vsync"], extract_vsync)? {
            cli.options.present_mode = present_mode;
        }

        // Windowing
        let width: Option<u32> = args.opt_value_from_str("--width")?;
        let height: Option<u32> = args.opt_value_from_str("--height")?;
        cli.options.size = match (width, height) {
            (Some(width), Some(height)) => Some(UVec2::new(width, height)),
            (None, None) => None,
            _ => return Err(ArgsError::HalfSize),
        };

        // Free args
        cli.example = args.opt_free_from_str()?;

        let remaining = args.finish();
        if !remaining.is_empty() {
            let unknown: Vec<_> = remaining.iter().map(|flag| format!("'{}'", flag.to_string_lossy())).collect();
            return Err(ArgsError::Unknown(unknown.join(" ")));
        }

        Ok(cli)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, ArgsError> {
        Cli::from_vec(args.iter().map(OsString::from).collect())
    }

    #[test]
    fn example_name_and_flags() {
        let cli = parse(&["-b", "vk", "--vsync", "mailbox", "--width", "600", "--height", "400", "reversed_z"]).unwrap();
        assert_eq!(cli.example.as_deref(), Some("reversed_z"));
        assert_eq!(cli.options.backend, Some(Backend::Vulkan));
        assert_eq!(cli.options.present_mode, PresentMode::Mailbox);
        assert_eq!(cli.options.size, Some(UVec2::new(600, 400)));
        assert!(!cli.list);
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli, Cli::default());
        assert_eq!(cli.options.present_mode, PresentMode::Fifo);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse(&["-b", "glide"]), Err(ArgsError::Parse(_))));
        assert!(matches!(parse(&["--width", "600"]), Err(ArgsError::HalfSize)));
        assert!(matches!(parse(&["triangle", "extra"]), Err(ArgsError::Unknown(_))));
    }

    #[test]
    fn device_is_lowercased() {
        let cli = parse(&["--device", "GeForce", "--list"]).unwrap();
        assert_eq!(cli.options.device.as_deref(), Some("geforce"));
        assert!(cli.list);
    }
}
