use std::fs;
use std::path::{Path, PathBuf};
use cbtsp_solver::instance::Instance;
use cbtsp_solver::solution::Solution;
use cbtsp_solver::visualization::Visualizer;

/// Render saved JSON solutions as PNG (or SVG when no converter is available).
///
/// Usage: `render_solution <instance.cbtsp> <solution.json> [output.png]`
/// or `render_solution --dir <directory>` to render every `<stem>.json` that
/// sits next to a `<stem>.cbtsp`.
fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [flag, dir] if flag == "--dir" => render_directory(Path::new(dir)),
        [instance, solution] => {
            let out = Path::new(solution).with_extension("png");
            if let Err(e) = render(Path::new(instance), Path::new(solution), &out) {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
        [instance, solution, out] => {
            if let Err(e) = render(Path::new(instance), Path::new(solution), Path::new(out)) {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
        _ => {
            eprintln!("usage: render_solution <instance.cbtsp> <solution.json> [output.png]");
            eprintln!("       render_solution --dir <directory>");
            std::process::exit(2);
        }
    }
}

fn render(instance_path: &Path, solution_path: &Path, out: &Path) -> Result<PathBuf, String> {
    let instance = Instance::from_file(instance_path, None)
        .map_err(|e| format!("Failed to load {:?}: {}", instance_path, e))?;
    let json = fs::read_to_string(solution_path)
        .map_err(|e| format!("Failed to read {:?}: {}", solution_path, e))?;
    let solution: Solution = serde_json::from_str(&json)
        .map_err(|e| format!("Invalid solution {:?}: {}", solution_path, e))?;

    let viz = Visualizer::new();
    let svg = viz.generate_svg(&instance, &solution);
    let written = viz
        .save_image(&svg, out)
        .map_err(|e| format!("Failed to write {:?}: {}", out, e))?;
    println!("Rendered {:?} -> {:?}", solution_path, written);
    Ok(written)
}

fn render_directory(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Failed to read {:?}: {}", dir, e);
            std::process::exit(1);
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let instance = path.with_extension("cbtsp");
        if !instance.exists() {
            eprintln!("Skipping {:?}: no matching .cbtsp", path);
            continue;
        }
        if let Err(e) = render(&instance, &path, &path.with_extension("png")) {
            eprintln!("{}", e);
        }
    }
}
