use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Config {
    package_file: String,
    #[serde(default)]
    product_name: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    icon: String,
}

fn main() {
    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set");
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let manifest_dir = PathBuf::from(manifest_dir);

    let config = load_config(&manifest_dir).unwrap_or_else(|err| {
        panic!("failed to load config.toml: {err}");
    });

    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows") {
        if let Err(err) = embed_resources(&manifest_dir, &config) {
            panic!("failed to embed version resources: {err}");
        }
    }

    if let Err(err) = write_config_rs(Path::new(&out_dir), &config) {
        panic!("failed to write config: {err}");
    }
}

fn load_config(manifest_dir: &Path) -> io::Result<Config> {
    let config_path = manifest_dir.join("config.toml");
    println!("cargo:rerun-if-changed={}", config_path.display());
    let contents = fs::read_to_string(&config_path)?;
    toml::from_str(&contents).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn embed_resources(manifest_dir: &Path, config: &Config) -> io::Result<()> {
    let mut res = winres::WindowsResource::new();
    let icon = config.icon.trim();
    if !icon.is_empty() {
        let icon_path = manifest_dir.join(icon);
        if icon_path.exists() {
            res.set_icon(icon_path.to_string_lossy().as_ref());
        }
    }
    if !config.product_name.is_empty() {
        res.set("ProductName", &config.product_name);
    }
    if !config.description.is_empty() {
        res.set("FileDescription", &config.description);
    }
    if !config.company.is_empty() {
        res.set("CompanyName", &config.company);
    }
    if !config.version.is_empty() {
        res.set("FileVersion", &config.version);
        res.set("ProductVersion", &config.version);
    }
    // The pairing is readable off the built binary, not only from source.
    if !config.package_file.is_empty() {
        res.set("PackageFileName", &config.package_file);
    }
    res.compile()?;
    Ok(())
}

fn write_config_rs(out_dir: &Path, config: &Config) -> io::Result<()> {
    let out_path = out_dir.join("bootstrap_config.rs");
    let mut file = File::create(&out_path)?;
    writeln!(file, "pub const PACKAGE_FILE: &str = {:?};", config.package_file)?;
    writeln!(file, "pub const PRODUCT_NAME: &str = {:?};", config.product_name)?;
    Ok(())
}
