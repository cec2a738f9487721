pub mod clear_screen;
pub mod compute_particles;
pub mod reversed_z;
pub mod textured_quad;
pub mod triangle;

pub mod args;

#[cfg(test)]
mod tests;

use std::process::ExitCode;

use lumen::AssetLoader;
use lumen_framework::LaunchOptions;
use rand::Rng;

pub struct ExampleDesc {
    pub name: &'static str,
    pub description: &'static str,
    pub run: fn(LaunchOptions) -> anyhow::Result<()>,
}

/// Every example, sorted by name.
const EXAMPLES: &[ExampleDesc] = &[
    ExampleDesc {
        name: "clear_screen",
        description: "Clears the window to an animated color",
        run: clear_screen::main,
    },
    ExampleDesc {
        name: "compute_particles",
        description: "Particles simulated in a compute pass and drawn additively",
        run: compute_particles::main,
    },
    ExampleDesc {
        name: "reversed_z",
        description: "Default and reversed depth buffers side by side",
        run: reversed_z::main,
    },
    ExampleDesc {
        name: "textured_quad",
        description: "A textured quad with an adjustable LOD bias",
        run: textured_quad::main,
    },
    ExampleDesc {
        name: "triangle",
        description: "A single colored triangle",
        run: triangle::main,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown example: {name}")]
pub struct NotFound {
    pub name: String,
}

pub fn count() -> usize {
    EXAMPLES.len()
}

pub fn lookup(name: &str) -> Result<&'static ExampleDesc, NotFound> {
    EXAMPLES
        .binary_search_by(|example| example.name.cmp(name))
        .map(|index| &EXAMPLES[index])
        .map_err(|_| NotFound { name: name.to_owned() })
}

pub fn random() -> &'static ExampleDesc {
    random_with(&mut rand::thread_rng())
}

pub fn random_with(rng: &mut impl Rng) -> &'static ExampleDesc {
    &EXAMPLES[rng.gen_range(0..EXAMPLES.len())]
}

pub fn names() -> impl Iterator<Item = &'static str> {
    EXAMPLES.iter().map(|example| example.name)
}

pub fn print_examples() {
    println!("Usage: lumen-examples [options] <example_name>");
    println!();
    println!("Available examples:");
    for example in EXAMPLES {
        println!("    {:<20}{}", example.name, example.description);
    }
}

/// Parses the command line and runs the chosen example.
pub fn main() -> ExitCode {
    let cli = match args::Cli::from_env() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}\n\n{}", e, args::HELP);
            return ExitCode::FAILURE;
        }
    };

    if cli.help {
        println!("{}", args::HELP);
        return ExitCode::SUCCESS;
    }
    if cli.list {
        print_examples();
        return ExitCode::SUCCESS;
    }

    let example = match (cli.random, cli.example.as_deref()) {
        (true, _) => random(),
        (false, Some(name)) => match lookup(name) {
            Ok(example) => example,
            Err(e) => {
                eprintln!("{}", e);
                eprintln!();
                print_examples();
                return ExitCode::FAILURE;
            }
        },
        (false, None) => {
            print_examples();
            return ExitCode::FAILURE;
        }
    };

    match (example.run)(cli.options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{} failed: {:?}", example.name, e);
            eprintln!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// Assets shipped next to this crate.
pub(crate) fn assets() -> AssetLoader {
    AssetLoader::new_local(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"))
}

#[cfg(test)]
mod registry_tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn lookup_finds_triangle() {
        let example = lookup("triangle").unwrap();
        assert_eq!(example.name, "triangle");
    }

    #[test]
    fn unknown_name_is_not_found() {
        assert_eq!(
            lookup("not-a-real-example").err(),
            Some(NotFound {
                name: "not-a-real-example".into()
            })
        );
    }

    #[test]
    fn names_are_sorted_and_unique() {
        let names: Vec<_> = names().collect();
        assert_eq!(names.len(), count());
        assert!(names.windows(2).all(|pair| pair[0] < pair[1]));
        for name in names {
            assert_eq!(lookup(name).map(|e| e.name), Ok(name));
        }
    }

    #[test]
    fn random_is_always_registered() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            let example = random_with(&mut rng);
            assert!(lookup(example.name).is_ok());
        }
    }

    #[test]
    fn shipped_assets_exist() {
        let assets = assets();
        for path in [
            "shaders/compute_particles/compute.wgsl",
            "shaders/compute_particles/render.wgsl",
            "shaders/reversed_z/color.wgsl",
            "shaders/reversed_z/depth_prepass.wgsl",
            "shaders/reversed_z/precision.wgsl",
            "shaders/reversed_z/texture_quad.wgsl",
            "shaders/textured_quad/quad.wgsl",
            "shaders/triangle/triangle.wgsl",
            "textures/checker.png",
        ] {
            assert!(assets.path(path).is_file(), "missing asset {path}");
        }
    }
}
