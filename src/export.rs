//! AMPL data export.
//!
//! Writes an instance as an AMPL `.dat` file (`set V`, `set K`, `param depot`,
//! `set U`, `set Vk[k]`, `param w`) and batch-converts whole directories of
//! `.cbtsp` files.

use crate::distance::Metric;
use crate::instance::Instance;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

fn join(ids: &[usize]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" ")
}

/// Write `instance` in AMPL data format. Weights are rounded to 2 decimals.
pub fn write_ampl_dat<W: Write>(instance: &Instance, out: &mut W) -> io::Result<()> {
    let mut ids = instance.node_ids();
    ids.sort_unstable();
    let salesmen: Vec<usize> = (1..=instance.salesmen).collect();

    writeln!(out, "set V := {};", join(&ids))?;
    writeln!(out, "set K := {};", join(&salesmen))?;
    writeln!(out)?;

    writeln!(out, "param depot :=")?;
    for k in &salesmen {
        writeln!(out, "{} {}", k, instance.depot)?;
    }
    writeln!(out, ";")?;
    writeln!(out)?;

    writeln!(out, "set U := {};", join(&instance.unassigned))?;
    writeln!(out)?;
    for &k in &salesmen {
        writeln!(out, "set Vk[{}] := {};", k, join(instance.cluster(k)))?;
    }
    writeln!(out)?;

    writeln!(out, "param w : {} :=", join(&ids))?;
    for &i in &ids {
        let row: Vec<String> = ids
            .iter()
            .map(|&j| format!("{:.2}", instance.distance(i, j)))
            .collect();
        writeln!(out, "{} {}", i, row.join(" "))?;
    }
    writeln!(out, ";")?;
    Ok(())
}

pub fn save_ampl_dat<P: AsRef<Path>>(instance: &Instance, path: P) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_ampl_dat(instance, &mut writer)?;
    writer.flush()
}

/// Convert every `.cbtsp` file of `input` into a `.dat` file in `output`.
/// Returns the number of converted instances.
pub fn convert_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    metric: Option<Metric>,
) -> Result<usize, String> {
    let output = output.as_ref();
    fs::create_dir_all(output)
        .map_err(|e| format!("Failed to create {}: {}", output.display(), e))?;

    let mut paths: Vec<_> = fs::read_dir(input.as_ref())
        .map_err(|e| format!("Failed to read {}: {}", input.as_ref().display(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "cbtsp"))
        .collect();
    paths.sort();

    let mut converted = 0;
    for path in paths {
        log::info!("Converting {}", path.display());
        let instance = Instance::from_file(&path, metric)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("instance");
        let target = output.join(format!("{}.dat", stem));
        save_ampl_dat(&instance, &target)
            .map_err(|e| format!("Failed to write {}: {}", target.display(), e))?;
        converted += 1;
    }
    Ok(converted)
}
