// Header generation for the C ABI.
//
// With `cbindgen` on PATH the header is regenerated from src/lib.rs into
// $OUT_DIR and mirrored to include/synthfx.h. Without it the checked-in
// include/synthfx.h is copied to $OUT_DIR unchanged.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::{env, fs};

const HEADER: &str = "synthfx.h";

fn cbindgen_available() -> bool {
    Command::new("cbindgen")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn generate(crate_dir: &Path, out: &Path) -> Result<(), String> {
    let status = Command::new("cbindgen")
        .args(["--crate", "synthfx-ffi", "--lang", "C", "--cpp-compat", "--output"])
        .arg(out)
        .current_dir(crate_dir)
        .status()
        .map_err(|e| e.to_string())?;
    if status.success() { Ok(()) } else { Err(format!("cbindgen exited with {status}")) }
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/{HEADER}");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let checked_in = crate_dir.join("include").join(HEADER);
    let generated = PathBuf::from(env::var("OUT_DIR")?).join(HEADER);

    if cbindgen_available() {
        match generate(&crate_dir, &generated) {
            Ok(()) => {
                fs::copy(&generated, &checked_in)?;
                return Ok(());
            }
            Err(e) => println!("cargo:warning=synthfx-ffi: {e}; using checked-in header"),
        }
    }

    fs::copy(&checked_in, &generated)?;
    Ok(())
}
