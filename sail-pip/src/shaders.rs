//  SHADERS.rs
//    by Lut99
//
//  Created:
//    22 Oct 2022, 15:01:44
//  Last edited:
//    14 Jan 2023, 18:36:29
//  Auto updated?
//    Yes
//
//  Description:
//!   Imports the internal SPIR-V shader modules as raw bytes in the
//!   code, and parses them into the words Vulkan wants.
//

use std::io::Cursor;

use rust_embed::RustEmbed;

pub use crate::errors::RenderPipelineError as Error;


/***** LIBRARY *****/
/// The embedded SPIR-V blobs of the internal fullscreen shaders.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/shaders/spir-v/"]
struct Shaders;



/// Loads one of the embedded shaders as SPIR-V words.
///
/// # Arguments
/// - `name`: The file name of the blob (e.g., `tonemap.frag.spv`).
///
/// # Errors
/// This function errors if the blob is not embedded (it was not compiled into `shaders/spir-v/`) or if it is not valid SPIR-V. Both abort startup.
pub fn load_shader(name: &'static str) -> Result<Vec<u32>, Error> {
    let file = match Shaders::get(name) {
        Some(file) => file,
        None       => { return Err(Error::MissingShader{ name }); }
    };
    match ash::util::read_spv(&mut Cursor::new(file.data.as_ref())) {
        Ok(words) => Ok(words),
        Err(err)  => Err(Error::ShaderParseError{ name, err }),
    }
}
