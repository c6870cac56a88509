use std::path::Path;

use anyhow::Result;

use cookbook_core::photo::{compress_photo_async, data_url_dimensions, decode_data_url};

use super::helpers::read_photo;

/// Run the photo pipeline on a file without touching the recipe store.
pub(crate) async fn cmd_photo(input: &Path, output: Option<&Path>, json: bool) -> Result<()> {
    let bytes = read_photo(input)?;
    let data_url = compress_photo_async(bytes).await?;
    let (width, height) = data_url_dimensions(&data_url)?;

    if let Some(path) = output {
        let jpeg = decode_data_url(&data_url)?;
        std::fs::write(path, &jpeg)?;
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "output": path.display().to_string(),
                    "width": width,
                    "height": height,
                    "bytes": jpeg.len(),
                })
            );
        } else {
            let size = jpeg.len();
            println!("Wrote {width}x{height} JPEG ({size} bytes) to {}", path.display());
        }
    } else if json {
        println!(
            "{}",
            serde_json::json!({ "photo": data_url, "width": width, "height": height })
        );
    } else {
        println!("{data_url}");
    }
    Ok(())
}
