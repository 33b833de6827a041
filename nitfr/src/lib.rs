use std::{fs::File, io::BufReader, path::Path};

use anyhow::{bail, Context, Result};
use image::ImageFormat;
use libnitf::{
    segment::SegmentData, Dialect, Document, ParseOptions, ParseStrategy, SegmentKind,
};
use tracing::{debug, info, instrument, warn};

/// Prints the file header, every subheader and every TRE of a file
#[instrument]
pub fn describe(nitf_file: &Path, decode_tres: bool) -> Result<()> {
    let options = ParseOptions::builder()
        .strategy(ParseStrategy::HeadersOnly)
        .decode_tres(decode_tres)
        .build();
    let doc = Document::from_file_with(nitf_file, &options)
        .with_context(|| format!("Failed to parse {}", nitf_file.display()))?;
    debug!("Parsed headers of {}", nitf_file.display());
    if decode_tres {
        debug!(
            "TREs decoded by name: {}",
            libnitf::tre::registered_tags().collect::<Vec<_>>().join(", ")
        );
    }

    print!("{}", doc.header());
    for tre in doc.header().tres.iter() {
        println!("  {tre}");
    }
    for (i, image) in doc.images().iter().enumerate() {
        println!(
            "image {i}: {:?} {}x{} {} bands, {} {} {}, {} bytes",
            image.identifier,
            image.columns,
            image.rows,
            image.band_count(),
            image.representation,
            image.category,
            image.compression,
            image.data.len()
        );
        for tre in image.tres.iter() {
            println!("  {tre}");
        }
    }
    for (i, graphic) in doc.graphics().iter().enumerate() {
        println!(
            "graphic {i}: {:?} at {}, {} bytes",
            graphic.identifier,
            graphic.location,
            graphic.data.len()
        );
    }
    for (i, symbol) in doc.symbols().iter().enumerate() {
        println!("symbol {i}: {:?} at {}", symbol.identifier, symbol.location);
    }
    for (i, label) in doc.labels().iter().enumerate() {
        println!("label {i}: {:?} at {}", label.identifier, label.location);
    }
    for (i, text) in doc.texts().iter().enumerate() {
        println!(
            "text {i}: {:?} {:?} ({}), {} bytes",
            text.identifier,
            text.title,
            text.format,
            text.data.len()
        );
    }
    for (i, des) in doc.data_extensions().iter().enumerate() {
        match des.overflow {
            Some(overflow) => println!(
                "data extension {i}: {:?} overflow of {:?} item {}",
                des.identifier, overflow.source, overflow.item
            ),
            None => println!(
                "data extension {i}: {:?}, {} bytes",
                des.identifier,
                des.data.len()
            ),
        }
    }
    for (i, res) in doc.reserved_extensions().iter().enumerate() {
        println!("reserved extension {i}: {:?}", res.identifier());
    }
    Ok(())
}

/// Parses a file and writes it back, optionally with every TRE left opaque
#[instrument]
pub fn rewrite(nitf_file: &Path, output_name: &Path, decode_tres: bool) -> Result<()> {
    let options = ParseOptions::builder().decode_tres(decode_tres).build();
    let doc = Document::from_file_with(nitf_file, &options)
        .with_context(|| format!("Failed to parse {}", nitf_file.display()))?;
    let plan = doc.plan()?;
    if plan.file_length() != doc.header().file_length() {
        warn!(
            "Rewritten file is {} bytes, source announced {}",
            plan.file_length(),
            doc.header().file_length()
        );
    }
    doc.to_file(output_name)?;
    info!("Successfully rewrote {}", output_name.display());
    Ok(())
}

/// Converts image segment `index` of a file to a PNG image
#[instrument]
pub fn nitf_to_image(nitf_file: &Path, index: usize, output_name: &Path) -> Result<()> {
    let options = ParseOptions::builder()
        .strategy(ParseStrategy::HeadersOnly)
        .build();
    let mut doc = Document::from_file_with(nitf_file, &options)?;
    let count = doc.segment_count(SegmentKind::Image);
    if index >= count {
        bail!("{} holds {count} image segments", nitf_file.display());
    }
    let source = BufReader::new(File::open(nitf_file)?);
    let data = doc.read_segment_data(source, SegmentKind::Image, index)?;
    debug!("Read {} bytes of image data", data.len());
    let image = &mut doc.images_mut()[index];
    image.data = SegmentData::Loaded(data);

    let img = image.to_dynamic_image()?;
    info!("Writing image to {}", output_name.display());
    img.save_with_format(output_name, ImageFormat::Png)?;
    info!("Successfully wrote image to {}", output_name.display());
    Ok(())
}

/// Wraps an image file into a single image segment document
#[instrument]
pub fn image_to_nitf(image_file: &Path, output_name: &Path, dialect: Dialect) -> Result<()> {
    let img = image::open(image_file)
        .with_context(|| format!("Failed to open {}", image_file.display()))?;
    let mut doc = Document::new(dialect);
    let title = image_file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    doc.header_mut().title = title.chars().take(80).collect();

    let mut segment = libnitf::segment::image::ImageSegment::from_dynamic_image(&img, dialect)?;
    segment.identifier = title.chars().take(10).collect();
    doc.add_image(segment)?;
    doc.to_file(output_name)?;
    info!("Successfully wrote {}", output_name.display());
    Ok(())
}
