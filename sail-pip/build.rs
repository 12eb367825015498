//  BUILD.rs
//    by Lut99
//
//  Created:
//    22 Oct 2022, 14:11:50
//  Last edited:
//    14 Jan 2023, 17:50:04
//  Auto updated?
//    Yes
//
//  Description:
//!   Build script for the sail-pip crate. Compiles the internal HLSL
//!   shaders to SPIR-V with glslc, with entry points `vert` and `frag`.
//

use std::fs;
use std::path::PathBuf;
use std::process::Command;


/***** CONSTANTS *****/
/// The internal shaders, as (file stem, stages) pairs.
const SHADERS: [&str; 3] = [ "depthcopy", "colorcopy", "tonemap" ];





/***** HELPER FUNCTIONS *****/
/// Checks if glslc is available in the PATH.
fn check_glslc() -> bool {
    let mut cmd = Command::new("glslc");
    cmd.arg("--version");
    match cmd.output() {
        Ok(output) => output.status.success(),
        Err(_)     => false,
    }
}

/// Runs glslc to compile one entry point of one HLSL file.
///
/// Will panic if the compilation itself fails.
fn glslc(src: &PathBuf, out: &PathBuf, stage: &str, entry: &str) {
    let mut cmd = Command::new("glslc");
    cmd.arg("-x").arg("hlsl")
       .arg(format!("-fshader-stage={}", stage))
       .arg(format!("-fentry-point={}", entry))
       .arg("-o").arg(out)
       .arg(src);
    let output = match cmd.output() {
        Ok(output) => output,
        Err(err)   => { panic!("Could not run command '{:?}' to compile shader: {}", cmd, err); }
    };
    if !output.status.success() {
        panic!("glslc returned non-zero exit status.\n\nStdout:\n{}\n\nStderr:\n{}\n\n", String::from_utf8_lossy(&output.stdout), String::from_utf8_lossy(&output.stderr));
    }
}





/// Entrypoint to the build script
fn main() {
    println!("cargo:rerun-if-changed=shaders/src");

    // Make sure the output folder exists either way, since the binary embeds it
    let spirv_dir = PathBuf::from("./shaders/spir-v");
    if !spirv_dir.exists() {
        fs::create_dir_all(&spirv_dir).unwrap_or_else(|err| panic!("Failed to create SPIR-V output directory '{}': {}", spirv_dir.display(), err));
    }

    // Without glslc we leave whatever SPIR-V is already there; the renderer reports missing blobs at startup
    if !check_glslc() {
        println!("cargo:warning=glslc not found in PATH; skipping shader compilation");
        return;
    }

    // Compile both entry points of every internal shader
    for stem in SHADERS {
        let src = PathBuf::from(format!("./shaders/src/{}.hlsl", stem));
        glslc(&src, &spirv_dir.join(format!("{}.vert.spv", stem)), "vertex", "vert");
        glslc(&src, &spirv_dir.join(format!("{}.frag.spv", stem)), "fragment", "frag");
    }
}
